//! Crate-wide error types.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by registration, validation and allocation bookkeeping.
///
/// Scheduling conflicts are not errors: unschedulable occurrences are
/// reported in-band and rejected allocations return `Ok(false)`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing value: {field}")]
    MissingValue { field: String },

    #[error("Value out of range: {field} {reason}")]
    OutOfRange { field: String, reason: String },

    #[error("Inconsistent arguments: {0}")]
    Inconsistent(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate { entity_type: String, id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    pub fn missing_value(field: impl Into<String>) -> Self {
        Self::MissingValue {
            field: field.into(),
        }
    }

    pub fn out_of_range(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the argument errors a caller can fix by changing its input.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::MissingValue { .. } | Self::OutOfRange { .. } | Self::Inconsistent(_)
        )
    }
}
