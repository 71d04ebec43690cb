//! Warden Core - shared vocabulary for classification-based row access control
//!
//! - [`WardenError`]: unified error type
//! - [`ClearanceToken`]: the `A` / `*` / `!A` / `!*` token grammar
//! - [`ValueKind`] / [`FieldValue`]: classifiable value kinds and token coercion
//! - [`ClearanceSource`]: the read contract consumed by the predicate compiler

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Clearance read contract and simple sources
pub mod source;

/// Clearance token grammar
pub mod token;

/// Classified value kinds
pub mod value;

pub use errors::{WardenError, WardenResult};
pub use source::{ClearanceSource, ClearanceVersion, FnClearanceSource, SourceId, StaticClearances};
pub use token::{split_token_list, ClearanceToken, NEGATION_MARKER, WILDCARD};
pub use value::{FieldValue, ValueKind};
