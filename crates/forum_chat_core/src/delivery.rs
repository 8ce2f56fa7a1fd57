//! crates/forum_chat_core/src/delivery.rs
//!
//! Orchestrates a send operation: validate, persist, fan out. Live delivery
//! is a latency optimization; the persisted message is the source of truth.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ChatEvent, Message};
use crate::ports::{ChatError, ChatResult, ConversationStore, MessageStore};
use crate::registry::ConnectionRegistry;

/// Coordinates the per-send pipeline
/// `Validating -> Persisting -> Delivering -> Done`, where a failure in the
/// first two phases returns the originating error and the third phase never
/// fails the operation.
pub struct DeliveryCoordinator {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
}

impl DeliveryCoordinator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            conversations,
            messages,
            registry,
        }
    }

    /// Sends one message and returns the persisted record as the
    /// authoritative acknowledgment.
    ///
    /// Validation failures carry no side effects. A storage failure during
    /// persistence is surfaced as-is and not retried here; resubmission is
    /// the caller's call. Delivery failures for individual recipients are
    /// swallowed: the message is already durable and will be picked up by
    /// the next `list_messages` poll.
    pub async fn send_message(
        &self,
        conversation_id: i64,
        sender_id: Uuid,
        content: &str,
    ) -> ChatResult<Message> {
        // Validating: conversation exists, sender belongs, content non-empty.
        let participants = self.conversations.participants(conversation_id).await?;
        if !participants.contains(&sender_id) {
            return Err(ChatError::Forbidden {
                user_id: sender_id,
                conversation_id,
            });
        }
        if content.trim().is_empty() {
            return Err(ChatError::InvalidContent);
        }

        // Persisting: the store re-runs the chain under its write lock and
        // assigns the ordered timestamp.
        let message = self
            .messages
            .append_message(conversation_id, sender_id, content)
            .await?;
        debug!(
            conversation_id,
            message_id = message.id,
            %sender_id,
            phase = "delivering",
            "message persisted, fanning out"
        );

        // Delivering: best-effort push to every other participant's handles.
        for recipient in participants.into_iter().filter(|p| *p != sender_id) {
            self.registry
                .send(
                    recipient,
                    ChatEvent::NewMessage {
                        conversation_id,
                        message: message.clone(),
                    },
                )
                .await;
        }

        Ok(message)
    }

    /// Fans out a typing indicator. Never persisted: if no recipient is
    /// connected the indicator is simply lost.
    pub async fn broadcast_typing(
        &self,
        conversation_id: i64,
        user_id: Uuid,
        is_typing: bool,
    ) -> ChatResult<()> {
        if !self
            .conversations
            .is_participant(conversation_id, user_id)
            .await?
        {
            return Err(ChatError::Forbidden {
                user_id,
                conversation_id,
            });
        }

        let participants = match self.conversations.participants(conversation_id).await {
            Ok(participants) => participants,
            Err(err) => {
                warn!(conversation_id, %err, "typing fan-out skipped");
                return Ok(());
            }
        };
        for recipient in participants.into_iter().filter(|p| *p != user_id) {
            self.registry
                .send(
                    recipient,
                    ChatEvent::Typing {
                        conversation_id,
                        user_id,
                        is_typing,
                    },
                )
                .await;
        }
        Ok(())
    }
}
