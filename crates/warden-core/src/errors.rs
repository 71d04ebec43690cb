//! Unified error system for Warden
//!
//! A single error type shared by every Warden crate. Ordinary denial of access is
//! never an error: it is expressed as a predicate that evaluates to `false`. Every
//! variant here signals a misconfiguration that surrounding code should treat as an
//! internal failure.

use serde::{Deserialize, Serialize};

/// Unified error type for all Warden operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WardenError {
    /// The type catalog has no description for the requested entity type
    #[error("Unknown entity type: {entity}")]
    UnknownEntityType {
        /// Entity type that was requested
        entity: String,
    },

    /// The entity type has no field with this name
    #[error("Unknown field '{field}' on entity type {entity}")]
    UnknownField {
        /// Entity type being configured
        entity: String,
        /// Field that was not found
        field: String,
    },

    /// The field is visible on the entity type but declared by another type
    #[error("Field '{field}' is not a field of {entity} (declared by {declared_by})")]
    ForeignField {
        /// Entity type being configured
        entity: String,
        /// Field being registered
        field: String,
        /// Type that actually declares the field
        declared_by: String,
    },

    /// The field's value kind cannot carry a classification
    #[error(
        "Field '{field}' of {entity} has kind {kind}; only the following kinds can be used as classifications: {supported}"
    )]
    UnsupportedFieldKind {
        /// Entity type being configured
        entity: String,
        /// Field being registered
        field: String,
        /// Kind of the field
        kind: String,
        /// Comma-separated list of supported kinds
        supported: String,
    },

    /// The field is already classified under a different dimension
    #[error(
        "Field '{field}' of {entity} is already classified under '{existing}', cannot reclassify under '{requested}'"
    )]
    ConflictingClassification {
        /// Entity type being configured
        entity: String,
        /// Field being registered
        field: String,
        /// Dimension the field is registered under
        existing: String,
        /// Dimension that was requested
        requested: String,
    },

    /// A permission pattern or classification selector could not be parsed
    #[error("Malformed selector '{selector}': {reason}")]
    MalformedSelector {
        /// The offending selector text
        selector: String,
        /// Parser message
        reason: String,
    },

    /// A clearance token cannot be parsed into the classified field's kind
    #[error("Cannot coerce clearance '{token}' to {kind} for field '{field}': {reason}")]
    ValueCoercion {
        /// Field the token was compiled against
        field: String,
        /// Kind of the field
        kind: String,
        /// Token text after stripping the negation marker
        token: String,
        /// Parser message
        reason: String,
    },

    /// No clearance source was wired into the registry
    #[error(
        "No clearance source configured: call PredicateRegistry::set_clearance_source during startup"
    )]
    MissingClearanceSource,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl WardenError {
    /// Create an unknown entity type error
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        Self::UnknownEntityType {
            entity: entity.into(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Create a malformed selector error
    pub fn malformed_selector(selector: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedSelector {
            selector: selector.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error was raised while configuring types, as opposed to
    /// while compiling a predicate
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownEntityType { .. }
                | Self::UnknownField { .. }
                | Self::ForeignField { .. }
                | Self::UnsupportedFieldKind { .. }
                | Self::ConflictingClassification { .. }
        )
    }
}

/// Standard Result type for Warden operations
pub type WardenResult<T> = std::result::Result<T, WardenError>;
