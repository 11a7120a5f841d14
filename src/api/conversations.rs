//! Conversation API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::requests::load_request;
use super::{ApiJson, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{Conversation, CreateConversationRequest, Message, SendMessageRequest};
use crate::workflow::gate;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationEnvelope {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize)]
pub struct ConversationsEnvelope {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub message: Message,
}

/// GET /api/conversations - The caller's live conversations.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<ConversationsEnvelope> {
    let conversations = state
        .repo
        .list_conversations_for(&user.id, Utc::now())
        .await?;
    Ok(Json(ConversationsEnvelope { conversations }))
}

/// POST /api/conversations - Open a conversation, or continue the existing
/// one for the same pair and request.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationEnvelope>), AppError> {
    let participant_id = required(body.participant_id, "participantId")?;
    let request_id = required(body.service_request_id, "serviceRequestId")?;
    if participant_id == user.id {
        return Err(AppError::Validation(
            "You cannot start a conversation with yourself".to_string(),
        ));
    }

    let request = load_request(&state, &request_id).await?;
    let Some(technician) = request.technician.as_deref() else {
        return Err(AppError::Validation(
            "The request has no technician assigned".to_string(),
        ));
    };

    let allowed = [request.client.as_str(), technician];
    if !allowed.contains(&user.id.as_str()) || !allowed.contains(&participant_id.as_str()) {
        return Err(AppError::Forbidden(
            "Not allowed to join this conversation".to_string(),
        ));
    }

    let now = Utc::now();
    if !gate::chat_allowed(request.status, request.completed_at, now) {
        return Err(AppError::Validation(
            "Chat is no longer allowed for this request".to_string(),
        ));
    }

    let expires_at = gate::expiry_deadline(request.status, request.completed_at);
    let first_message = body
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let existing = state
        .repo
        .find_conversation(&request.id, &user.id, &participant_id, now)
        .await?;

    let conversation = match existing {
        Some(conversation) => {
            match first_message {
                Some(body) => {
                    state
                        .repo
                        .append_message(&conversation.id, &user.id, body, expires_at)
                        .await?;
                }
                None => {
                    state
                        .repo
                        .set_conversation_expiry(&conversation.id, expires_at)
                        .await?
                }
            }
            state
                .repo
                .get_conversation(&conversation.id, Some(now))
                .await?
                .ok_or_else(|| AppError::not_found("Conversation"))?
        }
        None => {
            let conversation = state
                .repo
                .create_conversation(
                    &request.id,
                    [user.id.clone(), participant_id],
                    first_message,
                    expires_at,
                )
                .await?;
            tracing::info!(conversation_id = %conversation.id, request_id = %request.id, "Conversation opened");
            conversation
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ConversationEnvelope { conversation }),
    ))
}

/// GET /api/conversations/{id} - Read a thread (participants only).
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<ConversationEnvelope> {
    let conversation = load_own_conversation(&state, &id, &user.id, Some(Utc::now())).await?;
    Ok(Json(ConversationEnvelope { conversation }))
}

/// POST /api/conversations/{id}/messages - Append a message.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageEnvelope>), AppError> {
    let text = body.body.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Message body is required".to_string()));
    }

    // An elapsed deadline is reported through the chat rules, not as a 404
    let now = Utc::now();
    let conversation = load_own_conversation(&state, &id, &user.id, None).await?;
    let request = load_request(&state, &conversation.service_request).await?;

    if !gate::chat_allowed(request.status, request.completed_at, now) {
        return Err(AppError::Validation(
            "Chat is no longer allowed for this request".to_string(),
        ));
    }
    if conversation.expires_at.is_some_and(|deadline| deadline <= now) {
        return Err(AppError::not_found("Conversation"));
    }

    let expires_at = gate::expiry_deadline(request.status, request.completed_at);
    let message = state
        .repo
        .append_message(&conversation.id, &user.id, text, expires_at)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })))
}

/// Non-participants get the same 404 as for a missing thread.
async fn load_own_conversation(
    state: &AppState,
    id: &str,
    user_id: &str,
    live_at: Option<DateTime<Utc>>,
) -> Result<Conversation, AppError> {
    state
        .repo
        .get_conversation(id, live_at)
        .await?
        .filter(|conversation| conversation.has_participant(user_id))
        .ok_or_else(|| AppError::not_found("Conversation"))
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
}
