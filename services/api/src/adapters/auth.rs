//! services/api/src/adapters/auth.rs
//!
//! The boundary to the Authentication collaborator. This adapter resolves
//! session tokens against the `auth_sessions` table; issuing credentials and
//! password handling belong to the external identity service, not here.

use async_trait::async_trait;
use chrono::Duration;
use forum_chat_core::ports::{AuthService, ChatError, ChatResult};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{now_micros, storage};

/// Resolves session tokens to user ids.
pub struct SqliteAuthAdapter {
    pool: SqlitePool,
}

impl SqliteAuthAdapter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a user id in the local directory. Stands in for the user
    /// records the identity service would provision; participant validation
    /// reads this table.
    pub async fn ensure_user(&self, user_id: Uuid, display_name: &str) -> ChatResult<()> {
        sqlx::query("INSERT OR IGNORE INTO users (id, display_name) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(display_name)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Mints a session token for a user, valid for `ttl`. Used by the
    /// operator tooling and tests; the production token issuer is external.
    pub async fn issue_session(&self, user_id: Uuid, ttl: Duration) -> ChatResult<String> {
        let token = Uuid::new_v4().to_string();
        let expires_at =
            now_micros().saturating_add(ttl.num_microseconds().unwrap_or(i64::MAX));
        sqlx::query("INSERT INTO auth_sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id.to_string())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(token)
    }
}

#[async_trait]
impl AuthService for SqliteAuthAdapter {
    async fn resolve_session(&self, token: &str) -> ChatResult<Uuid> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT user_id, expires_at FROM auth_sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        let Some((user_id, expires_at)) = row else {
            return Err(ChatError::Unauthenticated);
        };
        if expires_at <= now_micros() {
            return Err(ChatError::Unauthenticated);
        }
        Uuid::parse_str(&user_id).map_err(|_| ChatError::Unauthenticated)
    }
}
