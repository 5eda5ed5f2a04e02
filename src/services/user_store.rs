//! User lookup for callback resolution, backed by SQLite.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    policy::{Provider, Secret, StoragePolicy, UnknownProvider},
    user::{User, UserStatus},
};

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("policy {policy_id}: {source}")]
    InvalidPolicy {
        policy_id: i64,
        #[source]
        source: UnknownProvider,
    },
    #[error("user {user_id} has unknown status {status}")]
    InvalidStatus { user_id: i64, status: i64 },
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// The user with `id`, if it exists, is not deleted, and is active.
    async fn get_active_user_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    nickname: String,
    status: i64,
    policy_id: i64,
    policy_name: String,
    provider: String,
    server: Option<String>,
    access_key: String,
    secret_key: String,
}

impl TryFrom<UserRow> for User {
    type Error = UserStoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let provider: Provider =
            row.provider
                .parse()
                .map_err(|source| UserStoreError::InvalidPolicy {
                    policy_id: row.policy_id,
                    source,
                })?;
        let status = UserStatus::from_code(row.status).ok_or(UserStoreError::InvalidStatus {
            user_id: row.id,
            status: row.status,
        })?;

        Ok(User {
            id: row.id,
            email: row.email,
            nickname: row.nickname,
            status,
            policy: StoragePolicy {
                id: row.policy_id,
                name: row.policy_name,
                provider,
                server: row.server,
                access_key: Secret::new(row.access_key),
                secret_key: Secret::new(row.secret_key),
            },
        })
    }
}

#[derive(Clone)]
pub struct SqliteUserStore {
    db: Arc<SqlitePool>,
}

impl SqliteUserStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_active_user_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.email, u.nickname, u.status,
                   p.id AS policy_id, p.name AS policy_name, p.provider, p.server,
                   p.access_key, p.secret_key
            FROM users u
            JOIN policies p ON p.id = u.policy_id
            WHERE u.id = ? AND u.status = 0 AND u.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(User::try_from).transpose()
    }
}
