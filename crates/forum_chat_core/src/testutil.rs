//! In-memory fakes shared by the core unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Conversation, ConversationSummary, Message};
use crate::ports::{ChatError, ChatResult, ConversationStore, MessageStore};

#[derive(Default)]
pub(crate) struct FakeConversationStore {
    conversations: Mutex<HashMap<i64, Vec<Uuid>>>,
    next_id: AtomicI64,
}

impl FakeConversationStore {
    pub(crate) fn add_conversation(&mut self, id: i64, participants: Vec<Uuid>) {
        self.conversations
            .get_mut()
            .expect("poisoned")
            .insert(id, participants);
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConversationStore for FakeConversationStore {
    async fn create_conversation(&self, participant_ids: &[Uuid]) -> ChatResult<Conversation> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.conversations
            .lock()
            .expect("poisoned")
            .insert(id, participant_ids.to_vec());
        Ok(Conversation {
            id,
            participants: participant_ids.to_vec(),
            created_at: Utc::now(),
        })
    }

    async fn participants(&self, conversation_id: i64) -> ChatResult<Vec<Uuid>> {
        self.conversations
            .lock()
            .expect("poisoned")
            .get(&conversation_id)
            .cloned()
            .ok_or(ChatError::NotFound(conversation_id))
    }

    async fn is_participant(&self, conversation_id: i64, user_id: Uuid) -> ChatResult<bool> {
        Ok(self
            .conversations
            .lock()
            .expect("poisoned")
            .get(&conversation_id)
            .is_some_and(|p| p.contains(&user_id)))
    }

    async fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> ChatResult<Vec<ConversationSummary>> {
        let conversations = self.conversations.lock().expect("poisoned");
        Ok(conversations
            .iter()
            .filter(|(_, participants)| participants.contains(&user_id))
            .map(|(id, participants)| ConversationSummary {
                id: *id,
                participants: participants.clone(),
                created_at: Utc::now(),
                last_message_at: None,
                unread: 0,
            })
            .collect())
    }
}

pub(crate) struct FakeMessageStore {
    conversations: Arc<FakeConversationStore>,
    pub(crate) appended: Mutex<Vec<Message>>,
    next_id: AtomicI64,
}

impl FakeMessageStore {
    pub(crate) fn new(conversations: Arc<FakeConversationStore>) -> Self {
        Self {
            conversations,
            appended: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl MessageStore for FakeMessageStore {
    async fn append_message(
        &self,
        conversation_id: i64,
        sender_id: Uuid,
        content: &str,
    ) -> ChatResult<Message> {
        self.conversations.participants(conversation_id).await?;
        if !self
            .conversations
            .is_participant(conversation_id, sender_id)
            .await?
        {
            return Err(ChatError::Forbidden {
                user_id: sender_id,
                conversation_id,
            });
        }
        if content.trim().is_empty() {
            return Err(ChatError::InvalidContent);
        }
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            conversation_id,
            sender_id,
            content: content.trim().to_owned(),
            sent_at: Utc::now(),
        };
        self.appended
            .lock()
            .expect("poisoned")
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        _requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ChatResult<Vec<Message>> {
        Ok(self
            .appended
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, _conversation_id: i64, _reader_id: Uuid) -> ChatResult<()> {
        Ok(())
    }

    async fn unread_count(&self, _conversation_id: i64, _reader_id: Uuid) -> ChatResult<i64> {
        Ok(0)
    }
}
