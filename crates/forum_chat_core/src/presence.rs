//! crates/forum_chat_core/src/presence.rs
//!
//! Per-user online/offline state and last-seen timestamps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Presence, PresenceStatus};
use crate::ports::{ChatResult, ConversationStore};

/// Tracks one presence record per user, overwritten in place on every
/// connect/disconnect transition.
///
/// Status changes are committed synchronously by the caller; notification
/// fan-out to subscribers is the Connection Registry's job and runs without
/// holding this tracker's lock.
pub struct PresenceTracker {
    conversations: Arc<dyn ConversationStore>,
    statuses: RwLock<HashMap<Uuid, Presence>>,
}

impl PresenceTracker {
    pub fn new(conversations: Arc<dyn ConversationStore>) -> Self {
        Self {
            conversations,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Marks the user online. Idempotent; last_seen is left untouched so it
    /// keeps describing the end of the previous session.
    pub async fn mark_online(&self, user_id: Uuid) {
        let mut statuses = self.statuses.write().await;
        let entry = statuses.entry(user_id).or_insert(Presence {
            user_id,
            status: PresenceStatus::Offline,
            last_seen: None,
        });
        if entry.status != PresenceStatus::Online {
            debug!(%user_id, "presence transition to online");
        }
        entry.status = PresenceStatus::Online;
    }

    /// Marks the user offline and stamps last_seen. Idempotent.
    pub async fn mark_offline(&self, user_id: Uuid) {
        let mut statuses = self.statuses.write().await;
        let entry = statuses.entry(user_id).or_insert(Presence {
            user_id,
            status: PresenceStatus::Offline,
            last_seen: None,
        });
        if entry.status != PresenceStatus::Offline {
            debug!(%user_id, "presence transition to offline");
        }
        entry.status = PresenceStatus::Offline;
        entry.last_seen = Some(Utc::now());
    }

    /// The current record for a user; users never seen read as offline.
    pub async fn status_of(&self, user_id: Uuid) -> Presence {
        self.statuses
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or(Presence {
                user_id,
                status: PresenceStatus::Offline,
                last_seen: None,
            })
    }

    /// The set of other users who should hear about this user's presence
    /// changes: the union of participants across all conversations the user
    /// is in. Presence is never broadcast globally.
    pub async fn subscribers_for(&self, user_id: Uuid) -> ChatResult<HashSet<Uuid>> {
        let summaries = self.conversations.conversations_for_user(user_id).await?;
        let mut subscribers = HashSet::new();
        for summary in summaries {
            subscribers.extend(summary.participants);
        }
        subscribers.remove(&user_id);
        Ok(subscribers)
    }
}
