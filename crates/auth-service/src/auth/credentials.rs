//! Password credential verification

use std::sync::Arc;

use async_trait::async_trait;

use crate::password::CredentialHasher;
use crate::store::UserStore;
use crate::Result;

/// Checks an email/password pair.
///
/// `Ok(false)` covers both an unknown email and a wrong password so callers
/// cannot tell them apart.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<bool>;
}

/// Verifies against the stored password hash.
pub struct StoreCredentialVerifier {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    dummy_hash: String,
}

impl StoreCredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, hasher: Arc<dyn CredentialHasher>) -> Result<Self> {
        // Compared against when there is no usable hash, so unknown emails
        // cost the same as wrong passwords.
        let dummy_hash = hasher.hash(&uuid::Uuid::new_v4().to_string())?;
        Ok(Self { users, hasher, dummy_hash })
    }
}

#[async_trait]
impl CredentialVerifier for StoreCredentialVerifier {
    async fn verify(&self, email: &str, password: &str) -> Result<bool> {
        let user = self.users.find_by_email(email).await?;

        match user {
            Some(user) if !user.is_externally_authenticated() => {
                self.hasher.verify(password, &user.password_hash)
            }
            _ => {
                let _ = self.hasher.verify(password, &self.dummy_hash);
                Ok(false)
            }
        }
    }
}
