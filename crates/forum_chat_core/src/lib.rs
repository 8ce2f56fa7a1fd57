pub mod delivery;
pub mod domain;
pub mod ports;
pub mod presence;
pub mod registry;

#[cfg(test)]
pub(crate) mod testutil;

pub use delivery::DeliveryCoordinator;
pub use domain::{
    ChatEvent, Conversation, ConversationSummary, Message, Presence, PresenceStatus,
};
pub use ports::{AuthService, ChatError, ChatResult, ConversationStore, MessageStore};
pub use presence::PresenceTracker;
pub use registry::{ConnectionRegistry, LiveConnection, OUTBOUND_QUEUE_DEPTH};
