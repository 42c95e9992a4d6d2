//! PostgreSQL-backed [`UserStore`].
//!
//! Schema lives in `passage_core/migrations/`; run [`crate::migrate::migrate`] first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::StoreError;
use super::store::UserStore;
use crate::models::oauth::OAuthProvider;
use crate::models::user::{LinkedProvider, User};

/// Columns selected for every user lookup.
const SELECT_USER: &str = "SELECT u.id, u.email, u.roles, u.avatar_url, u.verified, \
     u.created_at, u.updated_at, p.provider, p.provider_subject_id \
     FROM users u \
     LEFT JOIN user_oauth_providers p ON p.user_id = u.id";

type UserRow = (
    i64,
    String,
    Vec<String>,
    Option<String>,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
    Option<String>,
);

/// User store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_provider_identity(
        &self,
        provider: OAuthProvider,
        subject_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE p.provider = $1 AND p.provider_subject_id = $2"
        ))
        .bind(provider.as_str())
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn create(&self, mut user: User) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (email, roles, avatar_url, verified, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&user.email)
        .bind(user.role_list())
        .bind(&user.avatar_url)
        .bind(user.verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(link) = &user.linked_provider {
            sqlx::query(
                "INSERT INTO user_oauth_providers (user_id, provider, provider_subject_id) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(link.provider.as_str())
            .bind(&link.subject_id)
            .execute(&mut *tx)
            .await
            .map_err(conflict_or_db)?;
        }

        tx.commit().await?;
        user.id = Some(id);
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, StoreError> {
        let id = user
            .id
            .ok_or_else(|| StoreError::NotFound("user has no id".into()))?;
        let mut tx = self.pool.begin().await?;

        let email = sqlx::query_scalar::<_, String>(
            "UPDATE users SET roles = $2, avatar_url = $3, verified = $4, updated_at = $5 \
             WHERE id = $1 RETURNING email",
        )
        .bind(id)
        .bind(user.role_list())
        .bind(&user.avatar_url)
        .bind(user.verified)
        .bind(user.updated_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;

        match &user.linked_provider {
            Some(link) => {
                sqlx::query(
                    "INSERT INTO user_oauth_providers (user_id, provider, provider_subject_id) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (user_id) DO UPDATE \
                     SET provider = EXCLUDED.provider, \
                         provider_subject_id = EXCLUDED.provider_subject_id",
                )
                .bind(id)
                .bind(link.provider.as_str())
                .bind(&link.subject_id)
                .execute(&mut *tx)
                .await
                .map_err(conflict_or_db)?;
            }
            None => {
                sqlx::query("DELETE FROM user_oauth_providers WHERE user_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(User { email, ..user })
    }
}

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (id, email, roles, avatar_url, verified, created_at, updated_at, provider, subject) = row;

    let linked_provider = match (provider, subject) {
        (Some(provider), Some(subject_id)) => Some(LinkedProvider {
            provider: provider
                .parse()
                .map_err(|e| StoreError::Backend(format!("user {id}: {e}")))?,
            subject_id,
        }),
        _ => None,
    };

    Ok(User {
        id: Some(id),
        email,
        roles: roles.into_iter().collect(),
        avatar_url,
        verified,
        linked_provider,
        created_at,
        updated_at,
    })
}

fn conflict_or_db(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Db(e),
    }
}
