//! Configuration for auth-service

use serde::{Deserialize, Serialize};
use crate::jwt::JwtConfig;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    /// Role assigned on registration. Must already exist in the role catalog.
    pub default_role: String,
    pub api_bind_address: String,
}

/// Password configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub argon2_memory_cost: u32,
    pub argon2_time_cost: u32,
    pub argon2_parallelism: u32,
}

impl AuthConfig {
    /// Load configuration from `AUTH_*` environment variables layered over
    /// the defaults, e.g. `AUTH_DATABASE_URL` or `AUTH_JWT__SIGNING_KEY`.
    pub fn from_env() -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(
                config::Environment::with_prefix("AUTH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://auth.db?mode=rwc".to_string(),
            jwt: JwtConfig::default(),
            password: PasswordConfig::default(),
            default_role: "ROLE_USER".to_string(),
            api_bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 6,
            argon2_memory_cost: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}
