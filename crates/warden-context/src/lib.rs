//! # Warden Context - security context stack
//!
//! Ambient, nestable security scopes. Each scope owns clearances (per dimension
//! classification tokens) and permissions (granted and denied patterns) and inherits
//! those of its ancestors additively.
//!
//! ```ignore
//! let stack = ScopeStack::new();
//! stack.root().add_clearance("Region", "EU");
//! {
//!     let scope = stack.enter();
//!     scope.add_clearance("Region", "US");
//!     assert_eq!(stack.clearances_of("Region"), vec!["EU", "US"]);
//! }
//! assert_eq!(stack.clearances_of("Region"), vec!["EU"]);
//! ```

#![forbid(unsafe_code)]

pub mod ambient;
pub mod matcher;
pub mod scope;
pub mod stack;

pub use ambient::{spawn_inheriting, with_ambient_scopes};
pub use matcher::{ExactMatcher, GlobMatcher, MatcherKind, PermissionMatcher, RegexMatcher};
pub use scope::{ScopePath, SecurityScope};
pub use stack::{ScopeGuard, ScopeStack};
