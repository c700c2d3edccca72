//! Store Errors
//!
//! Error types for persistence operations.

use crate::domain::DomainError;

/// Errors that can occur in a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record the write refers to does not exist
    #[error(transparent)]
    NotFound(DomainError),

    /// The write would break a referential rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if this error is a conflict with existing data
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
