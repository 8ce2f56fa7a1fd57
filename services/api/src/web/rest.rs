//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use forum_chat_core::domain::{
    Conversation, ConversationSummary, Message, Presence, PresenceStatus,
};
use forum_chat_core::ports::ChatError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_conversation_handler,
        list_conversations_handler,
        send_message_handler,
        list_messages_handler,
        mark_read_handler,
        unread_count_handler,
        presence_handler,
    ),
    components(
        schemas(
            CreateConversationRequest,
            ConversationResponse,
            ConversationSummaryResponse,
            SendMessageRequest,
            MessageResponse,
            UnreadCountResponse,
            PresenceStatusDto,
            PresenceResponse,
        )
    ),
    tags(
        (name = "Conversations API", description = "REST endpoints for the real-time conversation core.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<Uuid>,
}

/// A conversation as returned to its participants.
#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: i64,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            participants: c.participants,
            created_at: c.created_at,
        }
    }
}

/// One row of the reader's conversation listing.
#[derive(Serialize, ToSchema)]
pub struct ConversationSummaryResponse {
    pub id: i64,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread: i64,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(s: ConversationSummary) -> Self {
        Self {
            id: s.id,
            participants: s.participants,
            created_at: s.created_at,
            last_message_at: s.last_message_at,
            unread: s.unread,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

/// The persisted message, returned to the sender as the authoritative
/// acknowledgment.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            content: m.content,
            sent_at: m.sent_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct MessagesQuery {
    /// Page size; defaults to 50.
    pub limit: Option<i64>,
    /// Number of messages to skip; defaults to 0.
    pub offset: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub conversation_id: i64,
    pub unread: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatusDto {
    Online,
    Offline,
}

#[derive(Serialize, ToSchema)]
pub struct PresenceResponse {
    pub user_id: Uuid,
    pub status: PresenceStatusDto,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<Presence> for PresenceResponse {
    fn from(p: Presence) -> Self {
        Self {
            user_id: p.user_id,
            status: match p.status {
                PresenceStatus::Online => PresenceStatusDto::Online,
                PresenceStatus::Offline => PresenceStatusDto::Offline,
            },
            last_seen: p.last_seen,
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps core errors onto HTTP statuses. Validation failures keep their
/// message; storage failures are logged and masked.
fn error_response(err: ChatError) -> (StatusCode, String) {
    let status = match &err {
        ChatError::InvalidParticipants(_) | ChatError::InvalidContent => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("storage failure: {:?}", err);
        (status, "internal error".to_string())
    } else {
        (status, err.to_string())
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Create a conversation from a set of participant ids.
///
/// The authenticated caller does not have to be in the set; the set itself
/// must contain at least two distinct known users.
#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 422, description = "Fewer than 2 distinct participants, or unknown user"),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn create_conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(_user_id): Extension<Uuid>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let conversation = app_state
        .conversations
        .create_conversation(&req.participant_ids)
        .await
        .map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse::from(conversation)),
    ))
}

/// List the caller's conversations, most-recently-active first.
#[utoipa::path(
    get,
    path = "/conversations",
    responses(
        (status = 200, description = "The caller's conversations", body = [ConversationSummaryResponse]),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn list_conversations_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summaries = app_state
        .conversations
        .conversations_for_user(user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(
        summaries
            .into_iter()
            .map(ConversationSummaryResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Send a message into a conversation.
///
/// Runs the full validate -> persist -> fan-out pipeline; the response is the
/// persisted record. Live delivery to other participants is best-effort and
/// never fails this call.
#[utoipa::path(
    post,
    path = "/conversations/{conversation_id}/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message persisted", body = MessageResponse),
        (status = 404, description = "Unknown conversation"),
        (status = 403, description = "Caller is not a participant"),
        (status = 422, description = "Empty or whitespace-only content"),
        (status = 401, description = "Missing or invalid session")
    ),
    params(
        ("conversation_id" = i64, Path, description = "The conversation to send into.")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = app_state
        .delivery
        .send_message(conversation_id, user_id, &req.content)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Fetch a page of messages in ascending sent order.
#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}/messages",
    responses(
        (status = 200, description = "A page of messages", body = [MessageResponse]),
        (status = 403, description = "Caller is not a participant"),
        (status = 401, description = "Missing or invalid session")
    ),
    params(
        ("conversation_id" = i64, Path, description = "The conversation to read."),
        MessagesQuery
    )
)]
pub async fn list_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let messages = app_state
        .messages
        .list_messages(
            conversation_id,
            user_id,
            query.limit.unwrap_or(50),
            query.offset.unwrap_or(0),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(
        messages
            .into_iter()
            .map(MessageResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Mark the whole conversation as read for the caller.
#[utoipa::path(
    post,
    path = "/conversations/{conversation_id}/read",
    responses(
        (status = 204, description = "Watermark advanced"),
        (status = 403, description = "Caller is not a participant"),
        (status = 401, description = "Missing or invalid session")
    ),
    params(
        ("conversation_id" = i64, Path, description = "The conversation to acknowledge.")
    )
)]
pub async fn mark_read_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .messages
        .mark_read(conversation_id, user_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Count the caller's unread messages in a conversation.
#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}/unread",
    responses(
        (status = 200, description = "Unread count", body = UnreadCountResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 401, description = "Missing or invalid session")
    ),
    params(
        ("conversation_id" = i64, Path, description = "The conversation to count.")
    )
)]
pub async fn unread_count_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let unread = app_state
        .messages
        .unread_count(conversation_id, user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(UnreadCountResponse {
        conversation_id,
        unread,
    }))
}

/// Look up a user's presence snapshot.
#[utoipa::path(
    get,
    path = "/presence/{user_id}",
    responses(
        (status = 200, description = "Presence snapshot", body = PresenceResponse),
        (status = 401, description = "Missing or invalid session")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The user to look up.")
    )
)]
pub async fn presence_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(_user_id): Extension<Uuid>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let presence = app_state.presence.status_of(user_id).await;
    Ok(Json(PresenceResponse::from(presence)))
}
