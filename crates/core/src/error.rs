use crate::types::DbId;

/// Domain error returned by every engine operation.
///
/// The variants map one-to-one onto what a caller can do about the failure:
/// re-fetch (`NotFound`), retry with different input (`Conflict`,
/// `Validation`), give up on the operation (`State`), or escalate
/// (`Internal`).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with key {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a `NotFound` keyed by a numeric id.
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::NotFound {
            entity,
            key: id.to_string(),
        }
    }

    /// Shorthand for a `NotFound` keyed by a string (e.g. a game pin).
    pub fn not_found_key(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
