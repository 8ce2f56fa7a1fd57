//! crates/forum_chat_core/src/registry.rs
//!
//! Maps authenticated users to their live duplex channels and owns the
//! first-handle-online / last-handle-offline presence coupling.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ChatEvent, PresenceStatus};
use crate::presence::PresenceTracker;

/// Depth of each handle's outbound queue. A handle that falls this far
/// behind is closed rather than allowed to stall producers.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// The receiving half of one registered connection, owned by the transport
/// task that pumps events to the socket.
///
/// `closed` fires when the registry drops the handle (slow consumer, or an
/// explicit unregister from another path); the transport task should exit.
pub struct LiveConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub events: mpsc::Receiver<ChatEvent>,
    pub closed: CancellationToken,
}

struct Outbound {
    id: Uuid,
    tx: mpsc::Sender<ChatEvent>,
    closed: CancellationToken,
}

type UserSlot = Arc<Mutex<Vec<Outbound>>>;

/// An explicitly constructed registry instance, shared via `Arc` by whatever
/// composes the server. There is no global singleton.
///
/// Lock discipline: the outer map lock is only held for slot lookup and
/// structural changes; per-user handle lists live behind their own mutex.
/// Every push into a slot happens while the map write lock is held, and slot
/// removal re-checks emptiness under the same lock, so a handle can never be
/// registered into a slot that has already been unlinked. First-online and
/// last-offline transitions are committed to the tracker before the map lock
/// is released, so the decision and its commit cannot interleave with a
/// racing transition for the same user. Lock order is map, then slot, then
/// presence. No lock is ever held across an await on the receiving side.
pub struct ConnectionRegistry {
    presence: Arc<PresenceTracker>,
    connections: RwLock<HashMap<Uuid, UserSlot>>,
}

impl ConnectionRegistry {
    pub fn new(presence: Arc<PresenceTracker>) -> Self {
        Self {
            presence,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a live channel for the user. Multiple concurrent handles per
    /// user are permitted (multi-device). The first handle for a user
    /// commits the online transition and broadcasts it to subscribers.
    pub async fn register(self: &Arc<Self>, user_id: Uuid) -> LiveConnection {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let id = Uuid::new_v4();
        let closed = CancellationToken::new();

        let first_handle = {
            let mut connections = self.connections.write().await;
            let slot = connections.entry(user_id).or_default();
            let mut handles = slot.lock().await;
            handles.push(Outbound {
                id,
                tx,
                closed: closed.clone(),
            });
            let first_handle = handles.len() == 1;
            if first_handle {
                // Committed under the map lock; only subscriber fan-out is
                // deferred.
                self.presence.mark_online(user_id).await;
            }
            first_handle
        };

        debug!(%user_id, connection_id = %id, first_handle, "registered live connection");
        if first_handle {
            self.spawn_presence_broadcast(user_id, PresenceStatus::Online);
        }

        LiveConnection {
            id,
            user_id,
            events: rx,
            closed,
        }
    }

    /// Removes one handle. The user goes offline only when their last handle
    /// is removed. Safe to call for a handle that is already gone.
    pub async fn unregister(self: &Arc<Self>, user_id: Uuid, connection_id: Uuid) {
        let last_handle = {
            let mut connections = self.connections.write().await;
            let Some(slot) = connections.get(&user_id).cloned() else {
                return;
            };
            let mut handles = slot.lock().await;
            let before = handles.len();
            handles.retain(|h| {
                if h.id == connection_id {
                    h.closed.cancel();
                    false
                } else {
                    true
                }
            });
            if handles.len() == before {
                return; // already removed, nothing to do
            }
            if handles.is_empty() {
                connections.remove(&user_id);
                self.presence.mark_offline(user_id).await;
                true
            } else {
                false
            }
        };

        debug!(%user_id, %connection_id, last_handle, "unregistered live connection");
        if last_handle {
            self.spawn_presence_broadcast(user_id, PresenceStatus::Offline);
        }
    }

    /// Best-effort fan-out of one event to every live handle for the user.
    ///
    /// Uses `try_send` only, so a slow or closed handle never blocks the
    /// caller or delivery to sibling handles; such handles are dropped and
    /// closed on the spot. Sends targeting users with no handles are no-ops.
    pub async fn send(self: &Arc<Self>, user_id: Uuid, event: ChatEvent) {
        let slot = {
            let connections = self.connections.read().await;
            match connections.get(&user_id) {
                Some(slot) => slot.clone(),
                None => return,
            }
        };

        let emptied = {
            let mut handles = slot.lock().await;
            handles.retain(|h| match h.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%user_id, connection_id = %h.id, "outbound queue full, dropping connection");
                    h.closed.cancel();
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    h.closed.cancel();
                    false
                }
            });
            handles.is_empty()
        };

        if emptied {
            self.remove_if_empty(user_id).await;
        }
    }

    /// Number of live handles for a user.
    pub async fn connections_for(&self, user_id: Uuid) -> usize {
        let slot = {
            let connections = self.connections.read().await;
            match connections.get(&user_id) {
                Some(slot) => slot.clone(),
                None => return 0,
            }
        };
        let handles = slot.lock().await;
        handles.len()
    }

    /// Unlinks the user's slot if it is still empty, firing the offline
    /// transition. The emptiness re-check under the write lock protects
    /// against a concurrent register that got in first.
    async fn remove_if_empty(self: &Arc<Self>, user_id: Uuid) {
        let removed = {
            let mut connections = self.connections.write().await;
            let Some(slot) = connections.get(&user_id).cloned() else {
                return;
            };
            let handles = slot.lock().await;
            if handles.is_empty() {
                connections.remove(&user_id);
                self.presence.mark_offline(user_id).await;
                true
            } else {
                false
            }
        };

        if removed {
            self.spawn_presence_broadcast(user_id, PresenceStatus::Offline);
        }
    }

    fn spawn_presence_broadcast(self: &Arc<Self>, user_id: Uuid, status: PresenceStatus) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let subscribers = match registry.presence.subscribers_for(user_id).await {
                Ok(subscribers) => subscribers,
                Err(err) => {
                    warn!(%user_id, %err, "failed to resolve presence subscribers");
                    return;
                }
            };
            for subscriber in subscribers {
                registry
                    .send(subscriber, ChatEvent::Presence { user_id, status })
                    .await;
            }
        });
    }
}
