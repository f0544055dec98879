//! Common error types for Segmark

use thiserror::Error;

/// Common result type for Segmark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error taxonomy across the backend
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found (entity, session, or job id)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The inference engine raised an error
    #[error("Inference engine error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that should map to a not-found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
