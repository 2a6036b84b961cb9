//! Direct conversations between users.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::SharedState;
use crate::error::ApiError;
use crate::models::{Claims, Conversation, Message};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub participant_id: String,
    pub property_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

fn participant_conversation(
    state: &SharedState,
    conversation_id: &str,
    uid: &str,
) -> Result<Conversation, ApiError> {
    let conversation = state
        .storage
        .get_conversation(conversation_id)?
        .ok_or_else(|| ApiError::NotFound(format!("conversation not found: {conversation_id}")))?;
    if !conversation.has_participant(uid) {
        return Err(ApiError::forbidden("not a participant of this conversation"));
    }
    Ok(conversation)
}

/// Opens (or returns the existing) conversation with another user.
pub(super) async fn start_conversation(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartConversationRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let other = payload.participant_id.trim();
    if other.is_empty() || other == claims.sub {
        return Err(ApiError::bad_request("participantId must name another user"));
    }
    state.storage.require_user(other)?;
    if let Some(property_id) = &payload.property_id {
        state.storage.require_property(property_id)?;
    }

    let conversation = state.storage.open_conversation(
        vec![claims.sub.clone(), other.to_string()],
        payload.property_id,
        Utc::now(),
    )?;
    Ok(Json(conversation))
}

pub(super) async fn list_conversations(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    Ok(Json(state.storage.conversations_for_user(&claims.sub)?))
}

/// Returns the thread in send order and clears the caller's unread counter.
pub(super) async fn list_messages(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    participant_conversation(&state, &conversation_id, &claims.sub)?;
    let messages = state.storage.messages_in_conversation(&conversation_id)?;
    state
        .storage
        .mark_conversation_read(&conversation_id, &claims.sub)?;
    Ok(Json(messages))
}

pub(super) async fn send_message(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    participant_conversation(&state, &conversation_id, &claims.sub)?;
    let message = state
        .storage
        .post_message(&conversation_id, &claims.sub, text, Utc::now())?;
    tracing::debug!(conversation_id = %conversation_id, sender = %claims.sub, "message sent");
    Ok((StatusCode::CREATED, Json(message)))
}
