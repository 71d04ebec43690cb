//! # Warden - Row-Level Classification Access Control
//!
//! Entities carry classification fields; callers hold clearances per dimension in
//! ambient, nestable security scopes. A row is visible when every classified field
//! of the row, and of every parent the row navigates to, is admitted by the
//! clearances the caller holds.
//!
//! - [`warden_core`]: errors, clearance tokens, value kinds, clearance sources
//! - [`warden_context`]: the security context stack
//! - [`warden_filter`]: predicate compilation and caching
//! - this crate: configuration and the [`AccessControl`] composition root
//!
//! ```ignore
//! let access = AccessControl::from_config(catalog, &WardenConfig::from_file(path)?)?;
//! let scope = access.enter();
//! scope.add_clearance("Region", "EU");
//! let visible: Vec<_> = access.access_scope_filtered(&invoices)?.collect();
//! ```

#![forbid(unsafe_code)]

pub mod access;
pub mod config;

pub use access::AccessControl;
pub use config::{ClassificationConfig, WardenConfig};

pub use warden_context::{
    spawn_inheriting, with_ambient_scopes, MatcherKind, ScopeGuard, ScopeStack, SecurityScope,
};
pub use warden_core::{
    ClearanceSource, FieldValue, StaticClearances, ValueKind, WardenError, WardenResult,
};
pub use warden_filter::{
    AccessFilterExt, Entity, EntitySchema, EntityType, Predicate, PredicateRegistry,
    SchemaCatalog, TypedEntity,
};
