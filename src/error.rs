//! Error handling module
//!
//! Application-level errors surrounding the domain: configuration, script
//! input and I/O.

use crate::config::ConfigError;
use crate::domain::DomainError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid script: {0}")]
    Script(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Errors caused by the input rather than the environment
    pub fn is_client_error(&self) -> bool {
        match self {
            AppError::Domain(e) => e.is_client_error(),
            AppError::Script(_) | AppError::Json(_) => true,
            AppError::Config(_) | AppError::Io(_) => false,
        }
    }
}
