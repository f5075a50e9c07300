//! The credential store capability.
//!
//! The auth layer only needs a handful of operations on user records. They
//! are expressed as [`CredentialStore`] so handlers can run against Postgres
//! in production and against [`MemoryCredentialStore`] in tests and local
//! tooling.

use async_trait::async_trait;
use chrono::Utc;
use proposta_core::types::UserId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::user::{CreateUser, User};
use crate::repositories::UserRepo;
use crate::DbPool;

/// Name of the unique index enforcing case-insensitive email uniqueness.
pub const EMAIL_UNIQUE_INDEX: &str = "uq_users_email_lower";

/// Failure modes of a [`CredentialStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert collided with an existing email.
    #[error("a user with this email already exists")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// User-record operations required by login, registration, the auth gate,
/// and the legacy password migration.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with [`StoreError::DuplicateEmail`] on collision.
    async fn insert(&self, input: &CreateUser) -> Result<User, StoreError>;

    /// Replace the stored hash. Returns `false` when no row has this id.
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, StoreError>;

    /// Every user, ordered by name.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Confirm the backing storage is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// [`CredentialStore`] over the Postgres `users` table.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn insert(&self, input: &CreateUser) -> Result<User, StoreError> {
        UserRepo::create(&self.pool, input).await.map_err(|err| {
            if is_email_unique_violation(&err) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(err)
            }
        })
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, StoreError> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(UserRepo::list(&self.pool).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

/// PostgreSQL unique violation (23505) on [`EMAIL_UNIQUE_INDEX`].
fn is_email_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err.constraint() == Some(EMAIL_UNIQUE_INDEX)
        }
        _ => false,
    }
}

/// In-process [`CredentialStore`]. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<Vec<User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user outright, as an external admin tool would.
    pub async fn remove(&self, id: UserId) -> bool {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|user| user.id != id);
        users.len() != before
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    async fn insert(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|user| user.email.eq_ignore_ascii_case(&input.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            email: input.email.clone(),
            cnpj_access: input.cnpj_access.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role.clone(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|user| user.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users = self.users.read().await.clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
