use thiserror::Error;

/// Engine error taxonomy.
///
/// `Validation`, `Forbidden` and `NotFound` carry a human-readable message
/// that is surfaced verbatim to the user. `Conflict` marks a concurrent-write
/// loss that is safe to retry once with a fresh read. `Db` covers
/// infrastructure failures; the operation is rolled back and not retried.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// True when the caller may retry the operation with a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
