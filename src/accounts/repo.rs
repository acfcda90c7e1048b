use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::accounts::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by (lowercased) email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a new user. Fails with `DuplicateEmail` if the email is taken.
    async fn insert(&self, new: NewUser) -> Result<User, RepoError>;

    /// Apply a partial update; returns `None` if the user does not exist.
    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Return the user's token, storing `candidate` if the user has none yet.
    async fn get_or_create(&self, user_id: Uuid, candidate: &str) -> anyhow::Result<String>;

    async fn find_user_id(&self, key: &str) -> anyhow::Result<Option<Uuid>>;
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
    tokens: HashMap<String, Uuid>,
    token_by_user: HashMap<Uuid, String>,
}

/// In-process store used for tests and for running without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(&email.to_lowercase())
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, RepoError> {
        let key = new.email.to_lowercase();
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&key) {
            return Err(RepoError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            is_active: false,
            is_staff: false,
            date_joined: OffsetDateTime::now_utc(),
        };
        inner.by_email.insert(key, user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(user);
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn get_or_create(&self, user_id: Uuid, candidate: &str) -> anyhow::Result<String> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.token_by_user.get(&user_id) {
            return Ok(existing.clone());
        }
        anyhow::ensure!(
            !inner.tokens.contains_key(candidate),
            "token key collision"
        );
        inner.tokens.insert(candidate.to_string(), user_id);
        inner.token_by_user.insert(user_id, candidate.to_string());
        Ok(candidate.to_string())
    }

    async fn find_user_id(&self, key: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(self.inner.read().await.tokens.get(key).copied())
    }
}
