//! External identity provider integration

use async_trait::async_trait;
use tracing::warn;

use crate::{Error, ExternalAssertion, Result, User};

/// First name given to users created from an external identity.
pub const EXTERNAL_FIRST_NAME: &str = "External";
/// Last name given to users created from an external identity.
pub const EXTERNAL_LAST_NAME: &str = "User";

/// Turns a provider assertion into a verified email.
///
/// Swap the implementation to add signature checks, provider allow-lists or
/// stricter attribute rules.
#[async_trait]
pub trait ExternalIdentityVerifier: Send + Sync {
    async fn verify_external_identity(&self, assertion: &ExternalAssertion) -> Result<String>;
}

/// Trusts the provider's `email` attribute as-is.
#[derive(Debug, Clone, Default)]
pub struct TrustedEmailVerifier;

#[async_trait]
impl ExternalIdentityVerifier for TrustedEmailVerifier {
    async fn verify_external_identity(&self, assertion: &ExternalAssertion) -> Result<String> {
        match assertion.attribute("email").map(str::trim) {
            Some(email) if !email.is_empty() => Ok(email.to_string()),
            _ => {
                warn!("Provider {} asserted no email", assertion.provider);
                Err(Error::ExternalIdentityRejected(format!(
                    "provider {} did not assert an email",
                    assertion.provider
                )))
            }
        }
    }
}

/// Result of onboarding an external identity
#[derive(Debug, Clone)]
pub struct OnboardingOutcome {
    pub user: User,
    pub token: String,
    /// Whether the user was created by this onboarding.
    pub created: bool,
}
