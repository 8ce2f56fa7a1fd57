//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use forum_chat_core::delivery::DeliveryCoordinator;
use forum_chat_core::ports::{AuthService, ConversationStore, MessageStore};
use forum_chat_core::presence::PresenceTracker;
use forum_chat_core::registry::ConnectionRegistry;

use crate::config::Config;

/// The shared application state, created once at startup and passed to all
/// handlers. The registry and delivery coordinator are explicit instances
/// wired here; nothing in the core is a process-wide singleton.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthService>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub presence: Arc<PresenceTracker>,
    pub registry: Arc<ConnectionRegistry>,
    pub delivery: Arc<DeliveryCoordinator>,
}
