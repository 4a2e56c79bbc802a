//! Error types for lease lock operations.

use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock specification is unusable (e.g., no identifier tokens).
    #[error("invalid lock specification: {0}")]
    InvalidSpecification(String),

    /// A builder or store was configured incompletely.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The store rejected a write because of a uniqueness constraint.
    #[error("conflicting lock record: {0}")]
    Conflict(String),

    /// Backend connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// The error raised when a specification has no usable identifier.
    pub fn identifier_required() -> Self {
        Self::InvalidSpecification("lock by identifier is required".to_string())
    }

    /// Wraps any backend failure.
    pub fn backend(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(error.into())
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
