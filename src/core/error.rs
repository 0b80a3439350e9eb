//! Domain errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Conversation with id '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    /// The provider cannot be called at all, e.g. missing credentials.
    #[error("chat provider is not configured: {0}")]
    Configuration(String),

    #[error("chat provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("chat provider unreachable: {0}")]
    Transport(String),
}
