//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the live conversation stream.
//!
//! Outbound frames are `forum_chat_core::domain::ChatEvent` values serialized
//! as JSON with a `type` tag (`new_message`, `typing`, `presence`); this
//! module only defines the inbound direction.

use serde::Deserialize;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
///
/// Message sends themselves go through the REST endpoint so the client gets
/// the persisted record as an acknowledgment; the socket carries only the
/// non-durable signals.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The user started or stopped typing in a conversation.
    /// Fire-and-forget: never persisted, lost if no recipient is connected.
    Typing {
        conversation_id: i64,
        is_typing: bool,
    },

    /// Acknowledges everything in the conversation as read, advancing the
    /// reader's watermark.
    MarkRead { conversation_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_frames_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"typing","conversation_id":3,"is_typing":true}"#)
                .unwrap();
        match msg {
            ClientMessage::Typing {
                conversation_id,
                is_typing,
            } => {
                assert_eq!(conversation_id, 3);
                assert!(is_typing);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_tags_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"emoji_blast"}"#).is_err());
    }
}
