//! Credential store and token ledger contracts

use async_trait::async_trait;
use crate::{Result, Role, Token, User};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// User and role persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// A missing email is `Ok(None)`, never an error.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Insert or update. Fails with `DuplicateIdentity` when another user
    /// already holds the email.
    async fn save(&self, user: User) -> Result<User>;

    /// Delete a user and its role assignments. Only used to undo a
    /// registration that could not be completed.
    async fn remove(&self, id: &str) -> Result<()>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
}

/// Issued-token persistence.
///
/// The ledger enforces no uniqueness of its own; the single active session
/// per user is maintained by `AuthenticationService`, which must be the only
/// writer.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn find_all_by_user(&self, user_id: &str) -> Result<Vec<Token>>;

    async fn find_by_token(&self, token: &str) -> Result<Option<Token>>;

    async fn save(&self, token: Token) -> Result<Token>;

    /// Persist the whole batch or nothing.
    async fn save_all(&self, tokens: Vec<Token>) -> Result<()>;
}
