//! Password hashing

use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use password_hash::{rand_core::OsRng, PasswordHash, SaltString};

use crate::config::PasswordConfig;
use crate::{Error, Result};

/// Pluggable password hashing.
///
/// Implementations must never return the plaintext, and `verify` must return
/// `false` (not an error) for an empty stored credential.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, stored_hash: &str) -> Result<bool>;
}

/// Argon2id hasher producing PHC strings
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| Error::Configuration(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::PasswordHash(e.to_string()))
    }

    fn verify(&self, password: &str, stored_hash: &str) -> Result<bool> {
        if stored_hash.is_empty() {
            return Ok(false);
        }
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::new(&PasswordConfig {
            argon2_memory_cost: 4096,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("secret").unwrap();

        assert_ne!(hash, "secret");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret", &hash).unwrap());
        assert!(!hasher.verify("Secret", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("secret").unwrap(), hasher.hash("secret").unwrap());
    }

    #[test]
    fn test_empty_credential_never_verifies() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("", "").unwrap());
        assert!(!hasher.verify("anything", "").unwrap());
    }

    #[test]
    fn test_invalid_params() {
        let result = Argon2Hasher::new(&PasswordConfig {
            argon2_memory_cost: 1,
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
