//! Authentication service

mod credentials;
mod session;

pub use credentials::{CredentialVerifier, StoreCredentialVerifier};
pub use session::{SessionGuard, SessionLocks};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use validator::{Validate, ValidateEmail};

use crate::external::{
    ExternalIdentityVerifier, OnboardingOutcome, TrustedEmailVerifier, EXTERNAL_FIRST_NAME,
    EXTERNAL_LAST_NAME,
};
use crate::jwt::TokenService;
use crate::password::CredentialHasher;
use crate::store::{TokenLedger, UserStore};
use crate::types::EXTERNAL_PASSWORD_SENTINEL;
use crate::{AuthRequest, AuthResponse, Error, ExternalAssertion, Result, Token, User};

/// Registration, login, external onboarding and session invalidation.
///
/// Every path that issues a token goes through `establish_session`, which
/// revokes the user's previous rows and records the new one in a single
/// ledger batch while holding that user's session lock. At most one active
/// ledger row exists per user as long as this service is the ledger's only
/// writer.
pub struct AuthenticationService {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn TokenLedger>,
    tokens: TokenService,
    hasher: Arc<dyn CredentialHasher>,
    verifier: Arc<dyn CredentialVerifier>,
    identity: Arc<dyn ExternalIdentityVerifier>,
    sessions: SessionLocks,
    default_role: String,
    min_password_length: usize,
}

impl AuthenticationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn TokenLedger>,
        tokens: TokenService,
        hasher: Arc<dyn CredentialHasher>,
        default_role: impl Into<String>,
    ) -> Result<Self> {
        let verifier = Arc::new(StoreCredentialVerifier::new(users.clone(), hasher.clone())?);

        Ok(Self {
            users,
            ledger,
            tokens,
            hasher,
            verifier,
            identity: Arc::new(TrustedEmailVerifier),
            sessions: SessionLocks::new(),
            default_role: default_role.into(),
            min_password_length: 1,
        })
    }

    pub fn with_credential_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_identity_verifier(mut self, identity: Arc<dyn ExternalIdentityVerifier>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_min_password_length(mut self, min_length: usize) -> Self {
        self.min_password_length = min_length.max(1);
        self
    }

    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an account with the default role and open its first session.
    pub async fn register(&self, request: AuthRequest) -> Result<AuthResponse> {
        request.validate()?;
        if request.password.chars().count() < self.min_password_length {
            return Err(Error::Validation(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }

        if self.users.find_by_email(&request.email).await?.is_some() {
            debug!("Registration rejected for existing email");
            return Err(Error::DuplicateIdentity(request.email));
        }

        let password_hash = self.hasher.hash(&request.password)?;

        let user = User {
            id: User::new_id(),
            email: request.email,
            first_name: request.firstname,
            last_name: request.lastname,
            password_hash,
            roles: vec![self.default_role().await?],
            created_at: Utc::now(),
        };
        let user = self.users.save(user).await?;

        let token = match self.establish_session(&user).await {
            Ok(token) => token,
            Err(e) => {
                error!("Session for new user {} could not be recorded: {}", user.id, e);
                if let Err(cleanup) = self.users.remove(&user.id).await {
                    error!("Failed to remove incomplete user {}: {}", user.id, cleanup);
                }
                return Err(e);
            }
        };

        info!(user_id = %user.id, "User registered");
        Ok(AuthResponse { token })
    }

    /// Password login. Revokes every earlier session of the user.
    pub async fn authenticate(&self, request: AuthRequest) -> Result<AuthResponse> {
        if !self.verifier.verify(&request.email, &request.password).await? {
            debug!("Credential verification failed");
            return Err(Error::InvalidCredentials);
        }

        let user = match self.users.find_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                error!("Verified principal missing from credential store");
                return Err(Error::UserNotFound(request.email));
            }
        };

        let token = self.establish_session(&user).await?;
        info!(user_id = %user.id, "User authenticated");
        Ok(AuthResponse { token })
    }

    /// Find or create the user behind an external identity and open a
    /// session for it. Prior sessions are revoked as for password login.
    pub async fn onboard_external(
        &self,
        assertion: &ExternalAssertion,
    ) -> Result<OnboardingOutcome> {
        let email = self.identity.verify_external_identity(assertion).await?;
        if !email.validate_email() {
            warn!("Provider {} asserted a malformed email", assertion.provider);
            return Err(Error::ExternalIdentityRejected(format!(
                "provider {} asserted a malformed email",
                assertion.provider
            )));
        }

        let (user, created) = match self.users.find_by_email(&email).await? {
            Some(user) => (user, false),
            None => self.create_external_user(email).await?,
        };

        let token = match self.establish_session(&user).await {
            Ok(token) => token,
            Err(e) => {
                if created {
                    if let Err(cleanup) = self.users.remove(&user.id).await {
                        error!("Failed to remove incomplete user {}: {}", user.id, cleanup);
                    }
                }
                return Err(e);
            }
        };

        info!(
            user_id = %user.id,
            provider = %assertion.provider,
            created,
            "External identity onboarded"
        );
        Ok(OnboardingOutcome { user, token, created })
    }

    /// Revoke the ledger row for `token`. Returns whether an active session
    /// was ended.
    pub async fn logout(&self, token: &str) -> Result<bool> {
        let Some(row) = self.ledger.find_by_token(token).await? else {
            return Ok(false);
        };

        let _guard = self.sessions.acquire(&row.user_id).await;
        // Re-read under the lock; a concurrent login may have revoked it.
        let Some(mut row) = self.ledger.find_by_token(token).await? else {
            return Ok(false);
        };
        if !row.is_active() {
            return Ok(false);
        }

        row.revoke();
        self.ledger.save(row.clone()).await?;
        info!(user_id = %row.user_id, "Session revoked");
        Ok(true)
    }

    /// The user a bearer token currently authorizes, if any.
    ///
    /// Requires a valid signature, an unexpired token whose subject is a
    /// known user, and an active ledger row. Anything else is `None`.
    pub async fn authorize(&self, token: &str) -> Result<Option<User>> {
        let subject = match self.tokens.extract_subject(token) {
            Ok(subject) => subject,
            Err(e) => {
                debug!("Token rejected: {}", e);
                return Ok(None);
            }
        };

        let Some(user) = self.users.find_by_email(&subject).await? else {
            return Ok(None);
        };
        if !self.tokens.validate(token, &user) {
            return Ok(None);
        }

        match self.ledger.find_by_token(token).await? {
            Some(row) if row.is_active() && row.user_id == user.id => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    /// Active ledger rows of a user.
    pub async fn active_sessions(&self, user_id: &str) -> Result<Vec<Token>> {
        let rows = self.ledger.find_all_by_user(user_id).await?;
        Ok(rows.into_iter().filter(Token::is_active).collect())
    }

    /// Insert a user for a first-time external email. A concurrent onboarding
    /// of the same email may win the insert; its user is reused.
    async fn create_external_user(&self, email: String) -> Result<(User, bool)> {
        let user = User {
            id: User::new_id(),
            email,
            first_name: EXTERNAL_FIRST_NAME.to_string(),
            last_name: EXTERNAL_LAST_NAME.to_string(),
            password_hash: EXTERNAL_PASSWORD_SENTINEL.to_string(),
            roles: vec![self.default_role().await?],
            created_at: Utc::now(),
        };

        match self.users.save(user).await {
            Ok(user) => Ok((user, true)),
            Err(Error::DuplicateIdentity(email)) => {
                debug!("Concurrent onboarding created the user first");
                let existing = self.users.find_by_email(&email).await?;
                existing
                    .map(|user| (user, false))
                    .ok_or(Error::DuplicateIdentity(email))
            }
            Err(e) => Err(e),
        }
    }

    async fn default_role(&self) -> Result<crate::Role> {
        self.users
            .find_role_by_name(&self.default_role)
            .await?
            .ok_or_else(|| {
                error!("Default role {} missing from role catalog", self.default_role);
                Error::Configuration(format!("role {} does not exist", self.default_role))
            })
    }

    /// Revoke all of the user's rows and record a freshly issued token, as
    /// one ledger batch under the user's session lock.
    async fn establish_session(&self, user: &User) -> Result<String> {
        let _guard = self.sessions.acquire(&user.id).await;

        let mut batch = self.ledger.find_all_by_user(&user.id).await?;
        let revoked = batch.iter().filter(|t| t.is_active()).count();
        for row in batch.iter_mut() {
            row.revoke();
        }

        let token = self.tokens.issue(user)?;
        batch.push(Token::active(&user.id, token.clone()));
        self.ledger.save_all(batch).await?;

        if revoked > 0 {
            debug!(user_id = %user.id, revoked, "Replaced existing sessions");
        }
        Ok(token)
    }
}
