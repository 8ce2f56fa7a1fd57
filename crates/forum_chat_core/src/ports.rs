//! crates/forum_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the messaging core.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete storage and authentication
//! implementations that live in the service crate.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Conversation, ConversationSummary, Message};

//=========================================================================================
// Error Taxonomy
//=========================================================================================

/// The error taxonomy shared by every core operation.
///
/// The first four variants are deterministic validation failures: they are
/// caller-correctable and produced before any side effect. `Storage` is fatal
/// and is surfaced as-is; the core never retries it.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid participants: {0}")]
    InvalidParticipants(String),
    #[error("message content is empty")]
    InvalidContent,
    #[error("conversation {0} not found")]
    NotFound(i64),
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    Forbidden { user_id: Uuid, conversation_id: i64 },
    #[error("missing or invalid session")]
    Unauthenticated,
    #[error("storage error: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, ChatError>`.
pub type ChatResult<T> = Result<T, ChatError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Owns conversation records and participant membership.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Creates a conversation from the given participant ids.
    ///
    /// The input list is deduplicated first; `InvalidParticipants` is
    /// returned if fewer than 2 distinct ids remain or if any id does not
    /// resolve to a known user. The conversation row and its membership rows
    /// are persisted atomically.
    async fn create_conversation(&self, participant_ids: &[Uuid]) -> ChatResult<Conversation>;

    /// Returns the participant set, or `NotFound` for a missing conversation.
    async fn participants(&self, conversation_id: i64) -> ChatResult<Vec<Uuid>>;

    /// Returns false (never an error) for a missing conversation, so callers
    /// can distinguish "unauthorized" from "not found" as they prefer.
    async fn is_participant(&self, conversation_id: i64, user_id: Uuid) -> ChatResult<bool>;

    /// All conversations containing the user, most-recently-active first
    /// (by latest message sent_at; conversations with no messages last).
    async fn conversations_for_user(&self, user_id: Uuid)
        -> ChatResult<Vec<ConversationSummary>>;
}

/// Owns ordered message records and per-reader read watermarks.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Validates and persists one message.
    ///
    /// Validation order: conversation exists (`NotFound`), sender is a
    /// participant (`Forbidden`), trimmed content is non-empty
    /// (`InvalidContent`). On success the store assigns a server-side
    /// timestamp that is >= the previous message's timestamp in the same
    /// conversation, even under concurrent senders.
    async fn append_message(
        &self,
        conversation_id: i64,
        sender_id: Uuid,
        content: &str,
    ) -> ChatResult<Message>;

    /// A finite page of messages in ascending sent_at order, restartable via
    /// `offset`. `Forbidden` for non-participants; an empty page (not an
    /// error) for a conversation with no messages or an offset past the end.
    async fn list_messages(
        &self,
        conversation_id: i64,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ChatResult<Vec<Message>>;

    /// Advances the reader's watermark to the latest message id in the
    /// conversation. `Forbidden` for non-participants.
    async fn mark_read(&self, conversation_id: i64, reader_id: Uuid) -> ChatResult<()>;

    /// Count of messages above the reader's watermark that were sent by
    /// someone else.
    async fn unread_count(&self, conversation_id: i64, reader_id: Uuid) -> ChatResult<i64>;
}

/// The boundary to the external Authentication collaborator.
///
/// The core trusts the resolved user id and does no credential checking of
/// its own.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves a session token to a user id, or `Unauthenticated`.
    async fn resolve_session(&self, token: &str) -> ChatResult<Uuid>;
}
