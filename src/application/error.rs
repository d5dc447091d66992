use crate::domain::DomainError;
use crate::ports::{AuthError, ConfigError, RepositoryError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] DomainError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Deliberately generic so a denied lookup does not reveal whether the
    /// project exists.
    #[error("Access denied")]
    AccessDenied,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Application error: {0}")]
    Application(String),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
