//! crates/forum_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the messaging subsystem.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fixed set of two or more users who may exchange messages.
///
/// The participant set is deduplicated at creation time and immutable
/// afterwards. Conversations are never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One row of a user's conversation listing, ordered most-recently-active
/// first. `unread` is computed against the reader's watermark.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread: i64,
}

/// A single persisted message.
///
/// `sent_at` is assigned by the store at persistence time and is
/// non-decreasing within a conversation; ids are strictly increasing, so the
/// pair (sent_at, id) gives a total order per conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A user's online/offline state as observed by this server.
/// One record per user, overwritten in place on every transition.
#[derive(Debug, Clone, Serialize)]
pub struct Presence {
    pub user_id: Uuid,
    pub status: PresenceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

/// An event pushed over a live connection.
///
/// This is a closed variant type rather than a free-form JSON object carrying
/// a "type" string; the transport layer serializes it exhaustively.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    NewMessage {
        conversation_id: i64,
        message: Message,
    },
    Typing {
        conversation_id: i64,
        user_id: Uuid,
        is_typing: bool,
    },
    Presence {
        user_id: Uuid,
        status: PresenceStatus,
    },
}
