use crate::domain::DomainError;
use crate::ports::{ConfigError, RepositoryError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Validation(#[from] DomainError),

    #[error("Application error: {0}")]
    Application(String),

    #[error("Not permitted: {0}")]
    PermissionDenied(String),

    #[error("Authentication required")]
    AuthenticationRequired,
}

impl AppError {
    /// True when the server (or the client, for anonymous viewers) refused the
    /// action because nobody is logged in.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AppError::Repository(e) => e.is_unauthorized(),
            AppError::AuthenticationRequired => true,
            _ => false,
        }
    }

    /// Text to show the user: the server's `detail` when it sent one,
    /// otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AppError::Repository(e) => e.detail().unwrap_or(fallback).to_string(),
            AppError::Validation(e) => e.to_string(),
            AppError::PermissionDenied(msg) | AppError::Application(msg) => msg.clone(),
            _ => fallback.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
