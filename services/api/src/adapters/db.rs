//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `ConversationStore` and `MessageStore` ports from
//! the core crate. It handles all interactions with SQLite using `sqlx`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use forum_chat_core::domain::{Conversation, ConversationSummary, Message};
use forum_chat_core::ports::{
    ChatError, ChatResult, ConversationStore, MessageStore,
};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{micros_to_utc, now_micros, storage};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the message-core storage ports.
///
/// Writes to one conversation are serialized through a per-conversation
/// append lock so concurrent senders cannot violate the monotonic-timestamp
/// invariant. Reads never take that lock.
pub struct SqliteStore {
    pool: SqlitePool,
    append_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SqliteStore {
    /// Creates a new `SqliteStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the persisted relations at startup. Idempotent.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        // One statement per query; sqlx prepares each individually.
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                display_name  TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS auth_sessions (
                token       TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                expires_at  INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at  INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS conversation_participants (
                conversation_id  INTEGER NOT NULL REFERENCES conversations(id),
                user_id          TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (conversation_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id  INTEGER NOT NULL REFERENCES conversations(id),
                sender_id        TEXT NOT NULL REFERENCES users(id),
                content          TEXT NOT NULL,
                sent_at          INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, sent_at, id)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS read_watermarks (
                conversation_id       INTEGER NOT NULL REFERENCES conversations(id),
                user_id               TEXT NOT NULL REFERENCES users(id),
                last_read_message_id  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (conversation_id, user_id)
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// The single-writer lock for one conversation.
    ///
    /// The map holds one entry per conversation ever written to and nothing
    /// evicts them; conversations are never deleted, so the map grows with
    /// the conversation table itself.
    async fn append_lock(&self, conversation_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.append_locks.lock().await;
        locks.entry(conversation_id).or_default().clone()
    }

    async fn conversation_exists(&self, conversation_id: i64) -> ChatResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM conversations WHERE id = ?")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        Ok(row.is_some())
    }

    async fn participant_ids(&self, conversation_id: i64) -> ChatResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT user_id FROM conversation_participants WHERE conversation_id = ? ORDER BY rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }

    async fn count_unread(&self, conversation_id: i64, reader_id: Uuid) -> ChatResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = ?
              AND sender_id != ?
              AND id > COALESCE(
                    (SELECT last_read_message_id FROM read_watermarks
                     WHERE conversation_id = ? AND user_id = ?),
                    0)
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id.to_string())
        .bind(conversation_id)
        .bind(reader_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(count)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    conversation_id: i64,
    sender_id: String,
    content: String,
    sent_at: i64,
}
impl MessageRecord {
    fn to_domain(self) -> ChatResult<Message> {
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: parse_uuid(&self.sender_id)?,
            content: self.content,
            sent_at: micros_to_utc(self.sent_at),
        })
    }
}

fn parse_uuid(raw: &str) -> ChatResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ChatError::Storage(format!("corrupt uuid column: {e}")))
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, participant_ids: &[Uuid]) -> ChatResult<Conversation> {
        // Dedup while preserving the caller's ordering.
        let mut distinct: Vec<Uuid> = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            if !distinct.contains(id) {
                distinct.push(*id);
            }
        }
        if distinct.len() < 2 {
            return Err(ChatError::InvalidParticipants(format!(
                "need at least 2 distinct participants, got {}",
                distinct.len()
            )));
        }
        for id in &distinct {
            let known: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
            if known.is_none() {
                return Err(ChatError::InvalidParticipants(format!("unknown user {id}")));
            }
        }

        // Conversation and membership rows land atomically.
        let created_at = now_micros();
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let result = sqlx::query("INSERT INTO conversations (created_at) VALUES (?)")
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        let id = result.last_insert_rowid();
        for participant in &distinct {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?, ?)",
            )
            .bind(id)
            .bind(participant.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }
        tx.commit().await.map_err(storage)?;

        Ok(Conversation {
            id,
            participants: distinct,
            created_at: micros_to_utc(created_at),
        })
    }

    async fn participants(&self, conversation_id: i64) -> ChatResult<Vec<Uuid>> {
        if !self.conversation_exists(conversation_id).await? {
            return Err(ChatError::NotFound(conversation_id));
        }
        self.participant_ids(conversation_id).await
    }

    async fn is_participant(&self, conversation_id: i64, user_id: Uuid) -> ChatResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.is_some())
    }

    async fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> ChatResult<Vec<ConversationSummary>> {
        let rows: Vec<(i64, i64, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT c.id, c.created_at, MAX(m.sent_at)
            FROM conversations c
            JOIN conversation_participants cp
              ON cp.conversation_id = c.id AND cp.user_id = ?
            LEFT JOIN messages m ON m.conversation_id = c.id
            GROUP BY c.id, c.created_at
            ORDER BY CASE WHEN MAX(m.sent_at) IS NULL THEN 1 ELSE 0 END,
                     MAX(m.sent_at) DESC,
                     c.id DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for (id, created_at, last_message_at) in rows {
            summaries.push(ConversationSummary {
                id,
                participants: self.participant_ids(id).await?,
                created_at: micros_to_utc(created_at),
                last_message_at: last_message_at.map(micros_to_utc),
                unread: self.count_unread(id, user_id).await?,
            });
        }
        Ok(summaries)
    }
}

//=========================================================================================
// `MessageStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append_message(
        &self,
        conversation_id: i64,
        sender_id: Uuid,
        content: &str,
    ) -> ChatResult<Message> {
        // Single-writer discipline per conversation; validation runs under
        // the lock so the membership check and the insert cannot interleave
        // with another append's timestamp assignment.
        let lock = self.append_lock(conversation_id).await;
        let _guard = lock.lock().await;

        if !self.conversation_exists(conversation_id).await? {
            return Err(ChatError::NotFound(conversation_id));
        }
        if !self.is_participant(conversation_id, sender_id).await? {
            return Err(ChatError::Forbidden {
                user_id: sender_id,
                conversation_id,
            });
        }
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidContent);
        }

        let (last_sent,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(sent_at) FROM messages WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;
        let sent_at = now_micros().max(last_sent.unwrap_or(0));

        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, sender_id, content, sent_at) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(sender_id.to_string())
        .bind(trimmed)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(Message {
            id: result.last_insert_rowid(),
            conversation_id,
            sender_id,
            content: trimmed.to_owned(),
            sent_at: micros_to_utc(sent_at),
        })
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ChatResult<Vec<Message>> {
        if !self.is_participant(conversation_id, requester_id).await? {
            return Err(ChatError::Forbidden {
                user_id: requester_id,
                conversation_id,
            });
        }

        let records: Vec<MessageRecord> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, sender_id, content, sent_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY sent_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        records.into_iter().map(MessageRecord::to_domain).collect()
    }

    async fn mark_read(&self, conversation_id: i64, reader_id: Uuid) -> ChatResult<()> {
        if !self.is_participant(conversation_id, reader_id).await? {
            return Err(ChatError::Forbidden {
                user_id: reader_id,
                conversation_id,
            });
        }

        // The watermark only ever advances.
        sqlx::query(
            r#"
            INSERT INTO read_watermarks (conversation_id, user_id, last_read_message_id)
            VALUES (?, ?, COALESCE((SELECT MAX(id) FROM messages WHERE conversation_id = ?), 0))
            ON CONFLICT (conversation_id, user_id) DO UPDATE SET
                last_read_message_id = MAX(read_watermarks.last_read_message_id,
                                           excluded.last_read_message_id)
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id.to_string())
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn unread_count(&self, conversation_id: i64, reader_id: Uuid) -> ChatResult<i64> {
        if !self.is_participant(conversation_id, reader_id).await? {
            return Err(ChatError::Forbidden {
                user_id: reader_id,
                conversation_id,
            });
        }
        self.count_unread(conversation_id, reader_id).await
    }
}
