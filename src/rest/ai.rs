//! Streaming AI proxies: assistant chat, document comparison chat and
//! one-shot text completion.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::SharedState;
use crate::llm::{
    ModelMessage, ModelRequest, CHAT_SYSTEM_PROMPT, COMPLETION_SYSTEM_PROMPT,
    MULTI_MODAL_SYSTEM_PROMPT,
};
use crate::ui_stream::{plain_text_response, to_model_messages, ui_message_response, UiMessage};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<UiMessage>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletionRequest {
    /// Instruction to carry out.
    pub prompt: Option<String>,
    /// Source text the instruction applies to.
    #[serde(default)]
    pub text: String,
}

/// Instruction first, then the source text when there is any.
fn completion_input(prompt: &str, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nText:\n{text}")
    }
}

async fn stream_chat(
    state: &SharedState,
    messages: &[UiMessage],
    system_prompt: &str,
    allow_files: bool,
    failure: &'static str,
) -> Response {
    let (turns, extra_system) = to_model_messages(messages, allow_files);
    let mut system = system_prompt.to_string();
    for instruction in extra_system {
        system.push_str("\n\n");
        system.push_str(&instruction);
    }

    match state
        .model
        .stream_text(ModelRequest {
            system,
            messages: turns,
        })
        .await
    {
        Ok(text) => ui_message_response(text),
        Err(err) => {
            tracing::error!(error = %err, "chat generation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, failure).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "UI message stream (text/event-stream)"),
        (status = 500, description = "Failed to process chat request")
    )
)]
pub(super) async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    stream_chat(
        &state,
        &payload.messages,
        CHAT_SYSTEM_PROMPT,
        false,
        "Failed to process chat request",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/multi-modal-chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "UI message stream (text/event-stream)"),
        (status = 500, description = "Failed to process multi-modal chat request")
    )
)]
pub(super) async fn multi_modal_chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    stream_chat(
        &state,
        &payload.messages,
        MULTI_MODAL_SYSTEM_PROMPT,
        true,
        "Failed to process multi-modal chat request",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/completion",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Plain text stream"),
        (status = 400, description = "Prompt is required"),
        (status = 500, description = "Failed to generate completion")
    )
)]
pub(super) async fn completion_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CompletionRequest>,
) -> Response {
    let Some(prompt) = payload
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Prompt is required" })),
        )
            .into_response();
    };

    let request = ModelRequest {
        system: COMPLETION_SYSTEM_PROMPT.to_string(),
        messages: vec![ModelMessage::user_text(completion_input(prompt, &payload.text))],
    };
    match state.model.stream_text(request).await {
        Ok(text) => plain_text_response(text),
        Err(err) => {
            tracing::error!(error = %err, "completion failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate completion").into_response()
        }
    }
}
