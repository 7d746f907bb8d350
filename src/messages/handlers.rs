/**
 * Messaging HTTP Handlers
 *
 * One-shot private messages land in the recipient's inbox and raise a
 * notification. Chat threads start pending between strangers; until the
 * other side accepts, only the initiator may write into the thread. Chat
 * messages are pushed over the recipient's realtime stream as well.
 */

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::users;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::notifications::{notify, NotificationContext};
use crate::posts::handlers::parse_object_id;
use crate::realtime::RealtimeEvent;
use crate::server::state::AppState;

use super::db::{self, ChatDoc, ChatMessage, MessageDoc};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
}

impl From<&MessageDoc> for MessageResponse {
    fn from(message: &MessageDoc) -> Self {
        Self {
            id: message.id.map(|id| id.to_hex()).unwrap_or_default(),
            sender: message.sender.clone(),
            recipient: message.recipient.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            is_read: message.is_read,
            sent_at: message.sent_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessageResponse {
    pub sender: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl From<&ChatMessage> for ChatMessageResponse {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender: message.sender.clone(),
            body: message.body.clone(),
            sent_at: message.sent_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub participants: Vec<String>,
    pub pending: bool,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl From<&ChatDoc> for ChatResponse {
    fn from(chat: &ChatDoc) -> Self {
        Self {
            id: chat.id.map(|id| id.to_hex()).unwrap_or_default(),
            participants: chat.participants.clone(),
            pending: chat.pending,
            message_count: chat.messages.len(),
            created_at: chat.created_at,
            last_message_at: chat.last_message_at,
        }
    }
}

// ---------------------------------------------------------------------------
// One-shot messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if request.body.trim().is_empty() {
        return Err(ApiError::bad_request("Message body cannot be empty"));
    }
    if request.to == user.username {
        return Err(ApiError::bad_request("Cannot message yourself"));
    }

    let recipient = users::require_by_username(&state.db, &request.to).await?;
    if recipient.has_blocked(&user.username) || user.has_blocked(&recipient.username) {
        return Err(ApiError::forbidden("Cannot message this user"));
    }

    let message = db::insert_message(
        &state.db,
        MessageDoc {
            id: None,
            sender: user.username.clone(),
            recipient: recipient.username.clone(),
            subject: request.subject,
            body: request.body,
            is_read: false,
            sent_at: Utc::now(),
        },
    )
    .await?;

    notify(
        &state.db,
        &state.realtime,
        &recipient.username,
        "message",
        format!("New message from {}", user.username),
        message.subject.clone(),
        &NotificationContext {
            actor: &user.username,
            subreddit: None,
            post_id: None,
            comment_id: None,
        },
    )
    .await?;

    Ok(Json(MessageResponse::from(&message)))
}

pub async fn inbox(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let messages = db::inbox(&state.db, &user.username).await?;
    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

pub async fn sent(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let messages = db::sent(&state.db, &user.username).await?;
    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    db::mark_message_read(&state.db, id, &user.username).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Chats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OpenChatRequest {
    pub with: String,
}

pub async fn open_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<OpenChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.with == user.username {
        return Err(ApiError::bad_request("Cannot chat with yourself"));
    }

    let other = users::require_by_username(&state.db, &request.with).await?;
    if other.has_blocked(&user.username) || user.has_blocked(&other.username) {
        return Err(ApiError::forbidden("Cannot chat with this user"));
    }

    if let Some(existing) = db::find_chat_between(&state.db, &user.username, &other.username).await?
    {
        return Ok(Json(ChatResponse::from(&existing)));
    }

    // Mutual followers skip the request stage
    let mutual = user.follows(&other.username) && other.follows(&user.username);
    let now = Utc::now();
    let chat = db::insert_chat(
        &state.db,
        ChatDoc {
            id: None,
            participants: vec![user.username.clone(), other.username.clone()],
            pending: !mutual,
            messages: Vec::new(),
            created_at: now,
            last_message_at: now,
        },
    )
    .await?;

    tracing::debug!(
        "chat opened between {} and {} (pending: {})",
        user.username,
        other.username,
        chat.pending
    );
    Ok(Json(ChatResponse::from(&chat)))
}

pub async fn accept_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_object_id(&id)?;
    let chat = db::require_chat(&state.db, id).await?;

    if !chat.has_participant(&user.username) {
        return Err(ApiError::forbidden("Not your chat"));
    }
    if chat.initiator() == user.username {
        return Err(ApiError::forbidden("The initiator cannot accept the request"));
    }
    if !chat.pending {
        return Err(ApiError::conflict("Chat already accepted"));
    }

    db::accept_chat(&state.db, id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub body: String,
}

pub async fn send_chat_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ChatMessageRequest>,
) -> ApiResult<Json<Value>> {
    if request.body.trim().is_empty() {
        return Err(ApiError::bad_request("Message body cannot be empty"));
    }

    let id = parse_object_id(&id)?;
    let chat = db::require_chat(&state.db, id).await?;

    if !chat.has_participant(&user.username) {
        return Err(ApiError::forbidden("Not your chat"));
    }
    // A pending thread is a request: only the initiator may keep writing
    if chat.pending && chat.initiator() != user.username {
        return Err(ApiError::forbidden("Accept the chat request first"));
    }

    let message = ChatMessage {
        sender: user.username.clone(),
        body: request.body,
        sent_at: Utc::now(),
    };
    db::push_chat_message(&state.db, id, &message).await?;

    if let Some(other) = chat.other_participant(&user.username) {
        state.realtime.send_to(
            other,
            RealtimeEvent::ChatMessage {
                chat_id: id.to_hex(),
                from: message.sender.clone(),
                body: message.body.clone(),
                sent_at: message.sent_at.timestamp_millis(),
            },
        );
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<ChatResponse>>> {
    let chats = db::list_chats(&state.db, &user.username).await?;
    Ok(Json(chats.iter().map(ChatResponse::from).collect()))
}

pub async fn chat_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ChatMessageResponse>>> {
    let id = parse_object_id(&id)?;
    let chat = db::require_chat(&state.db, id).await?;

    if !chat.has_participant(&user.username) {
        return Err(ApiError::forbidden("Not your chat"));
    }

    Ok(Json(chat.messages.iter().map(ChatMessageResponse::from).collect()))
}
