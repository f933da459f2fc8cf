//! In-memory store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{TokenLedger, UserStore};
use crate::{Error, Result, Role, Token, User};

/// In-memory implementation of both store contracts.
///
/// Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Map of user_id to user
    users: Arc<DashMap<String, User>>,
    /// Map of email to user_id
    emails: Arc<DashMap<String, String>>,
    /// Map of role name to role
    roles: Arc<DashMap<String, Role>>,
    /// Map of token id to ledger row
    tokens: Arc<RwLock<HashMap<String, Token>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the role catalog.
    pub fn with_role(self, name: &str) -> Self {
        self.roles.entry(name.to_string()).or_insert_with(|| Role {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let id = match self.emails.get(email) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|entry| entry.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|entry| entry.clone()))
    }

    async fn save(&self, user: User) -> Result<User> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(entry) if entry.get() != &user.id => {
                return Err(Error::DuplicateIdentity(user.email));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(user.id.clone());
            }
        }

        // Release a previous email when the user row is being updated.
        if let Some(previous) = self.users.insert(user.id.clone(), user.clone()) {
            if previous.email != user.email {
                self.emails.remove(&previous.email);
            }
        }
        Ok(user)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        if let Some((_, user)) = self.users.remove(id) {
            self.emails.remove(&user.email);
        }
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.roles.get(name).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl TokenLedger for MemoryStore {
    async fn find_all_by_user(&self, user_id: &str) -> Result<Vec<Token>> {
        let tokens = self.tokens.read();
        let mut owned: Vec<Token> = tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|t| t.created_at);
        Ok(owned)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Token>> {
        Ok(self.tokens.read().values().find(|t| t.token == token).cloned())
    }

    async fn save(&self, token: Token) -> Result<Token> {
        self.tokens.write().insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn save_all(&self, tokens: Vec<Token>) -> Result<()> {
        let mut stored = self.tokens.write();
        for token in tokens {
            stored.insert(token.id.clone(), token);
        }
        Ok(())
    }
}
