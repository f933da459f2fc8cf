//! Core types for auth-service

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Password credential stored for users who never log in with a password.
pub const EXTERNAL_PASSWORD_SENTINEL: &str = "";

/// Role reference data, looked up by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: String,
    pub name: String,
}

/// Registered user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user ID
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// Users onboarded through an identity provider carry no password.
    pub fn is_externally_authenticated(&self) -> bool {
        self.password_hash == EXTERNAL_PASSWORD_SENTINEL
    }
}

/// A ledger row for one issued token.
///
/// The token string never changes once recorded; only `expired` and `revoked`
/// flip, and always together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Token {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expired: bool,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// A fresh, active row for `token` owned by `user_id`.
    pub fn active(user_id: &str, token: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token,
            expired: false,
            revoked: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.expired && !self.revoked
    }

    pub fn revoke(&mut self) {
        self.expired = true;
        self.revoked = true;
    }
}

/// Registration and login payload. Login ignores the name fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AuthRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub firstname: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub lastname: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(max = 128))]
    pub password: String,
}

impl AuthRequest {
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// Response carrying the issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Attributes asserted by an external identity provider after it has
/// authenticated a principal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalAssertion {
    pub provider: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ExternalAssertion {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// String value of an attribute, if present and a string.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }
}
