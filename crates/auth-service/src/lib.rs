//! # Auth-Service
//!
//! Session token issuance, validation and revocation for registered users.
//!
//! This crate provides:
//! - Password registration and login with Argon2id hashing
//! - HS256 JWT issuance and validation against a process-wide signing key
//! - A token ledger with at most one active session per user
//! - Onboarding of identities asserted by an external identity provider
//! - A small REST API over the above
//!
//! ## Architecture
//!
//! `AuthenticationService` orchestrates a `UserStore` (users and roles), a
//! `TokenLedger` (issued tokens) and a `TokenService` (signing). Both stores
//! are traits; `SqliteStore` and `MemoryStore` implement them.

pub mod error;
pub mod types;
pub mod auth;
pub mod store;
pub mod jwt;
pub mod password;
pub mod external;
pub mod api;
pub mod config;

pub use error::{Error, Result};
pub use types::{User, Role, Token, AuthRequest, AuthResponse, ExternalAssertion};
pub use auth::{AuthenticationService, CredentialVerifier};
pub use store::{UserStore, TokenLedger, SqliteStore, MemoryStore};
pub use jwt::{TokenService, SigningKey, TokenClaims, TokenValidity};
pub use password::{CredentialHasher, Argon2Hasher};
pub use external::{ExternalIdentityVerifier, TrustedEmailVerifier, OnboardingOutcome};
pub use config::AuthConfig;

use std::sync::Arc;

/// Initialize the auth service on top of SQLite.
///
/// The configured default role is seeded into the role catalog so that
/// registration can resolve it.
pub async fn init(config: AuthConfig) -> Result<AuthenticationService> {
    let store = Arc::new(SqliteStore::new(&config.database_url).await?);
    store.ensure_role(&config.default_role).await?;

    let signing_key = SigningKey::from_config(&config.jwt)?;
    if config.jwt.signing_key.is_none() {
        tracing::warn!("No signing key configured; tokens will not survive a restart");
    }
    let token_service = TokenService::new(config.jwt.clone(), &signing_key);
    let hasher = Arc::new(Argon2Hasher::new(&config.password)?);

    let service = AuthenticationService::new(
        store.clone(),
        store,
        token_service,
        hasher,
        config.default_role,
    )?
    .with_min_password_length(config.password.min_length);

    Ok(service)
}
