pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use middleware::require_auth;
pub use rest::{
    create_conversation_handler, health_handler, list_conversations_handler,
    list_messages_handler, mark_read_handler, presence_handler, send_message_handler,
    unread_count_handler,
};
pub use ws_handler::ws_handler;
