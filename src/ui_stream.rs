//! Chat UI message format: request decoding and the streamed response encoding.
//!
//! Requests carry `UIMessage`s (`{ id, role, parts: [...] }`). Responses are
//! server-sent events, one JSON chunk per `data:` line, terminated by
//! `data: [DONE]`.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use utoipa::ToSchema;

use crate::llm::{ContentPart, ModelMessage, ModelRole, TextStream};

pub const STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum UiPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "file", rename_all = "camelCase")]
    File {
        media_type: Option<String>,
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
    /// Reasoning, tool and step markers are display-only.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UiMessage {
    #[serde(default)]
    pub id: String,
    pub role: UiRole,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub parts: Vec<UiPart>,
    /// Older clients send a flat string instead of parts.
    #[serde(default)]
    pub content: Option<String>,
}

impl UiMessage {
    fn content_parts(&self, allow_files: bool) -> Vec<ContentPart> {
        let mut out = Vec::new();
        if let Some(content) = self.content.as_deref().filter(|c| !c.trim().is_empty()) {
            out.push(ContentPart::Text(content.to_string()));
        }
        for part in &self.parts {
            match part {
                UiPart::Text { text } if !text.trim().is_empty() => {
                    out.push(ContentPart::Text(text.clone()))
                }
                UiPart::File {
                    media_type, url, ..
                } if allow_files => out.push(ContentPart::Image {
                    url: url.clone(),
                    media_type: media_type.clone(),
                }),
                _ => {}
            }
        }
        out
    }
}

/// Converts UI messages to model turns. System messages fold into the
/// returned extra instructions; empty turns are dropped.
pub fn to_model_messages(messages: &[UiMessage], allow_files: bool) -> (Vec<ModelMessage>, Vec<String>) {
    let mut turns = Vec::new();
    let mut system = Vec::new();
    for message in messages {
        let content = message.content_parts(allow_files);
        if content.is_empty() {
            continue;
        }
        match message.role {
            UiRole::System => system.push(
                ModelMessage {
                    role: ModelRole::System,
                    content,
                }
                .text(),
            ),
            UiRole::User => turns.push(ModelMessage {
                role: ModelRole::User,
                content,
            }),
            UiRole::Assistant => turns.push(ModelMessage {
                role: ModelRole::Assistant,
                content,
            }),
        }
    }
    (turns, system)
}

fn event(chunk: Value) -> Bytes {
    Bytes::from(format!("data: {chunk}\n\n"))
}

/// Wraps model text deltas in the UI message stream protocol.
pub fn ui_message_events(
    text: TextStream,
) -> impl futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let message_id = format!("msg-{}", uuid::Uuid::new_v4().simple());
    let text_id = format!("txt-{}", uuid::Uuid::new_v4().simple());

    let head = stream::iter(vec![
        event(json!({ "type": "start", "messageId": message_id })),
        event(json!({ "type": "start-step" })),
        event(json!({ "type": "text-start", "id": text_id })),
    ]);

    let delta_id = text_id.clone();
    let body = text.map(move |chunk| match chunk {
        Ok(delta) => event(json!({ "type": "text-delta", "id": delta_id, "delta": delta })),
        Err(err) => {
            tracing::warn!(error = %err, "model stream failed mid-response");
            event(json!({ "type": "error", "errorText": "The assistant stopped responding. Please try again." }))
        }
    });

    let tail = stream::iter(vec![
        event(json!({ "type": "text-end", "id": text_id })),
        event(json!({ "type": "finish-step" })),
        event(json!({ "type": "finish" })),
        Bytes::from_static(b"data: [DONE]\n\n"),
    ]);

    head.chain(body).chain(tail).map(Ok)
}

/// Streaming HTTP response in the UI message stream format.
pub fn ui_message_response(text: TextStream) -> Response {
    let mut response = (StatusCode::OK, Body::from_stream(ui_message_events(text))).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(STREAM_HEADER, HeaderValue::from_static("v1"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Streaming HTTP response of bare text chunks.
pub fn plain_text_response(text: TextStream) -> Response {
    let body = text.filter_map(|chunk| async move {
        match chunk {
            Ok(delta) => Some(Ok::<_, Infallible>(Bytes::from(delta))),
            Err(err) => {
                // Plain text has no in-band error channel; the body just ends
                tracing::warn!(error = %err, "completion stream failed mid-response");
                None
            }
        }
    });
    let mut response = (StatusCode::OK, Body::from_stream(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
