//! JWT token issuance and validation

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result, User};

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

const SIGNING_KEY_BYTES: usize = 32;

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub token_ttl_seconds: u64,
    pub key_id: String,
    /// Base64 encoded HS256 secret. A fresh key is generated when absent,
    /// which invalidates every token issued by a previous process.
    pub signing_key: Option<String>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            key_id: "auth-service-1".to_string(),
            signing_key: None,
        }
    }
}

/// Process-wide symmetric signing key.
///
/// Created once at startup and shared read-only by every `TokenService`
/// clone. Replacing it invalidates all outstanding tokens.
#[derive(Clone)]
pub struct SigningKey {
    secret: Arc<Vec<u8>>,
}

impl SigningKey {
    pub fn generate() -> Self {
        let mut secret = vec![0u8; SIGNING_KEY_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self { secret: Arc::new(secret) }
    }

    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        if secret.len() < SIGNING_KEY_BYTES {
            return Err(Error::Configuration(format!(
                "Signing key must be at least {} bytes, got {}",
                SIGNING_KEY_BYTES,
                secret.len()
            )));
        }
        Ok(Self { secret: Arc::new(secret.to_vec()) })
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let secret = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Configuration(format!("Invalid signing key encoding: {}", e)))?;
        Self::from_bytes(&secret)
    }

    /// Load the configured key, or generate one if none is configured.
    pub fn from_config(config: &JwtConfig) -> Result<Self> {
        match config.signing_key.as_deref() {
            Some(encoded) => Self::from_base64(encoded),
            None => Ok(Self::generate()),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.secret.as_slice())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").field("secret", &"[redacted]").finish()
    }
}

/// Claims embedded in every issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,              // Subject (user email)
    pub email: String,
    pub roles: Vec<String>,
    pub iat: i64,                 // Issued at
    pub exp: i64,                 // Expiration
    pub jti: String,              // Unique per issuance
}

/// Outcome of checking a well-formed token against a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidity {
    Valid,
    Expired,
    SubjectMismatch,
}

impl TokenValidity {
    pub fn is_valid(self) -> bool {
        self == TokenValidity::Valid
    }
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    header: Header,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: JwtConfig, key: &SigningKey) -> Self {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(config.key_id.clone());

        // Expiry is checked by `evaluate_at` so that `exp` itself counts as
        // expired and expired tokens still yield their claims.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            config,
            encoding_key: Arc::new(EncodingKey::from_secret(&key.secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(&key.secret)),
            header,
            validation,
        }
    }

    pub fn from_config(config: JwtConfig) -> Result<Self> {
        let key = SigningKey::from_config(&config)?;
        Ok(Self::new(config, &key))
    }

    pub fn token_ttl_seconds(&self) -> u64 {
        self.config.token_ttl_seconds
    }

    /// Issue a signed token for `user`, valid for the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<String> {
        self.issue_at(user, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, user: &User, now: i64) -> Result<String> {
        let exp = i64::try_from(self.config.token_ttl_seconds)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "token lifetime of {} seconds is out of range",
                    self.config.token_ttl_seconds
                ))
            })?;

        let claims = TokenClaims {
            sub: user.email.clone(),
            email: user.email.clone(),
            roles: user.role_names(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    /// True only for a correctly signed, unexpired token whose subject is
    /// `user`'s email. Never fails; any parse or signature problem is `false`.
    pub fn validate(&self, token: &str, user: &User) -> bool {
        self.validate_at(token, user, chrono::Utc::now().timestamp())
    }

    pub fn validate_at(&self, token: &str, user: &User, now: i64) -> bool {
        match self.evaluate_at(token, user, now) {
            Ok(validity) => validity.is_valid(),
            Err(e) => {
                debug!("Rejecting token: {}", e);
                false
            }
        }
    }

    /// Classify a token against `user`. Only an unparseable or badly signed
    /// token is an error.
    pub fn evaluate(&self, token: &str, user: &User) -> Result<TokenValidity> {
        self.evaluate_at(token, user, chrono::Utc::now().timestamp())
    }

    pub fn evaluate_at(&self, token: &str, user: &User, now: i64) -> Result<TokenValidity> {
        let claims = self.extract_all_claims(token)?;

        if claims.sub != user.email {
            return Ok(TokenValidity::SubjectMismatch);
        }
        if now >= claims.exp {
            return Ok(TokenValidity::Expired);
        }
        Ok(TokenValidity::Valid)
    }

    /// Apply `selector` to the verified claims of `token`.
    pub fn extract_claim<T, F>(&self, token: &str, selector: F) -> Result<T>
    where
        F: FnOnce(&TokenClaims) -> T,
    {
        let claims = self.extract_all_claims(token)?;
        Ok(selector(&claims))
    }

    pub fn extract_subject(&self, token: &str) -> Result<String> {
        self.extract_claim(token, |c| c.sub.clone())
    }

    pub fn extract_expiration(&self, token: &str) -> Result<i64> {
        self.extract_claim(token, |c| c.exp)
    }

    pub fn extract_all_claims(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| Error::MalformedToken(e.to_string()))
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Utc;

    fn user(email: &str) -> User {
        User {
            id: User::new_id(),
            email: email.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Li".to_string(),
            password_hash: String::new(),
            roles: vec![Role { id: "r1".to_string(), name: "ROLE_USER".to_string() }],
            created_at: Utc::now(),
        }
    }

    fn service() -> TokenService {
        TokenService::new(JwtConfig::default(), &SigningKey::generate())
    }

    #[test]
    fn test_jwt_config_default() {
        let config = JwtConfig::default();
        assert_eq!(config.token_ttl_seconds, 86_400);
        assert_eq!(config.key_id, "auth-service-1");
    }

    #[test]
    fn test_issue_then_validate() {
        let tokens = service();
        let ana = user("ana@x.com");
        let token = tokens.issue(&ana).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert!(tokens.validate(&token, &ana));

        let claims = tokens.extract_all_claims(&token).unwrap();
        assert_eq!(claims.sub, "ana@x.com");
        assert_eq!(claims.email, "ana@x.com");
        assert_eq!(claims.roles, vec!["ROLE_USER"]);
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_out_of_range_lifetime_is_configuration_error() {
        let ana = user("ana@x.com");
        for ttl in [u64::MAX, i64::MAX as u64] {
            let config = JwtConfig { token_ttl_seconds: ttl, ..Default::default() };
            let tokens = TokenService::new(config, &SigningKey::generate());
            let result = tokens.issue_at(&ana, 1_700_000_000);
            assert!(matches!(result, Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn test_tokens_are_unique_per_issuance() {
        let tokens = service();
        let ana = user("ana@x.com");
        let now = Utc::now().timestamp();
        assert_ne!(tokens.issue_at(&ana, now).unwrap(), tokens.issue_at(&ana, now).unwrap());
    }

    #[test]
    fn test_expiry_boundary() {
        let tokens = service();
        let ana = user("ana@x.com");
        let issued_at = 1_700_000_000;
        let token = tokens.issue_at(&ana, issued_at).unwrap();
        let exp = tokens.extract_expiration(&token).unwrap();

        assert!(tokens.validate_at(&token, &ana, exp - 1));
        assert!(!tokens.validate_at(&token, &ana, exp));
        assert!(!tokens.validate_at(&token, &ana, exp + 1));
        assert_eq!(tokens.evaluate_at(&token, &ana, exp).unwrap(), TokenValidity::Expired);
    }

    #[test]
    fn test_subject_mismatch() {
        let tokens = service();
        let token = tokens.issue(&user("ana@x.com")).unwrap();
        let bob = user("bob@y.com");

        assert!(!tokens.validate(&token, &bob));
        assert_eq!(tokens.evaluate(&token, &bob).unwrap(), TokenValidity::SubjectMismatch);
    }

    #[test]
    fn test_foreign_key_is_rejected() {
        let ana = user("ana@x.com");
        let token = service().issue(&ana).unwrap();
        let other = service();

        assert!(!other.validate(&token, &ana));
        assert!(matches!(other.extract_subject(&token), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = service();
        let ana = user("ana@x.com");

        assert!(!tokens.validate("not-a-token", &ana));
        assert!(!tokens.validate("", &ana));
        assert!(matches!(tokens.evaluate("a.b.c", &ana), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let tokens = service();
        let ana = user("ana@x.com");
        let token = tokens.issue(&ana).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let forged_json = r#"{"sub":"ana@x.com","email":"ana@x.com","roles":["ROLE_ADMIN"],
            "iat":0,"exp":9999999999,"jti":"x"}"#;
        let forged_claims = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(forged_json);
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(!tokens.validate(&forged, &ana));
    }

    #[test]
    fn test_configured_key_is_stable() {
        let key = SigningKey::generate();
        let config = JwtConfig {
            signing_key: Some(key.to_base64()),
            ..Default::default()
        };
        let ana = user("ana@x.com");

        let first = TokenService::from_config(config.clone()).unwrap();
        let second = TokenService::from_config(config).unwrap();
        let token = first.issue(&ana).unwrap();
        assert!(second.validate(&token, &ana));
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(matches!(SigningKey::from_bytes(b"short"), Err(Error::Configuration(_))));
        assert!(matches!(SigningKey::from_base64("%%%"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = SigningKey::generate();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains(&key.to_base64()));
    }
}
