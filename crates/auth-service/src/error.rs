//! Error types for auth-service

use thiserror::Error;

/// Errors raised by registration, login, onboarding and the stores behind them.
///
/// Business-rule failures (`DuplicateIdentity`, `InvalidCredentials`,
/// `Validation`, ...) are recoverable at the request boundary. `Database`
/// carries store faults through unchanged. An expired or foreign token is not
/// an error at all; see [`crate::jwt::TokenValidity`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Email already registered: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("External identity rejected: {0}")]
    ExternalIdentityRejected(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Configuration(error.to_string())
    }
}
