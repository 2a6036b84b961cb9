//! Hosted language model access.
//!
//! `LanguageModel` is the seam the HTTP layer talks to; `HostedModel` builds
//! an `llm` provider per request and relays its streaming chat as text deltas.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use thiserror::Error;

use crate::config::LlmConfig;

pub const CHAT_SYSTEM_PROMPT: &str = "You are DomusEye Assistant, a helpful property-management assistant. \
Help tenants, landlords and agents with questions about rental listings, applications, \
lease terms, payments, maintenance and moving. Be concise and practical, and say so \
when a question needs a landlord, agent or legal professional.";

pub const MULTI_MODAL_SYSTEM_PROMPT: &str = "You are DomusEye Document Assistant. \
Users share property documents and photos (titles, contracts, IDs, floor plans, listing \
images). Compare the provided documents and images carefully, point out matches, \
differences and inconsistencies, and flag anything that looks altered or incomplete. \
Never invent details that are not visible in the material.";

pub const COMPLETION_SYSTEM_PROMPT: &str = "You are a writing assistant for property listings and \
tenant communication. Follow the instruction exactly and return only the resulting text, \
without preamble.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("nothing to send: the conversation has no content")]
    EmptyConversation,
}

impl From<llm::error::LLMError> for LlmError {
    fn from(err: llm::error::LLMError) -> Self {
        LlmError::Upstream(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image { url: String, media_type: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: Vec<ContentPart>,
}

impl ModelMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ModelMessage>,
}

pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Starts a generation. Errors before the first token come back as `Err`;
    /// later failures arrive inside the stream.
    async fn stream_text(&self, request: ModelRequest) -> Result<TextStream, LlmError>;
}


pub fn map_backend(provider: &str) -> Result<LLMBackend, LlmError> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}

/// Turns model turns into `llm` chat messages. System turns are returned
/// separately so they can join the system prompt; each image of a user turn
/// follows that turn's text as its own image-URL message.
pub fn chat_messages(turns: &[ModelMessage]) -> (Vec<ChatMessage>, Vec<String>) {
    let mut messages = Vec::new();
    let mut system = Vec::new();
    for turn in turns {
        let text = turn.text();
        match turn.role {
            ModelRole::System => system.push(text),
            ModelRole::Assistant => messages.push(ChatMessage::assistant().content(text).build()),
            ModelRole::User => {
                if !text.is_empty() {
                    messages.push(ChatMessage::user().content(text).build());
                }
                for part in &turn.content {
                    if let ContentPart::Image { url, .. } = part {
                        messages.push(ChatMessage::user().image_url(url.clone()).build());
                    }
                }
            }
        }
    }
    (messages, system)
}

/// Streaming chat against the configured `llm` backend.
pub struct HostedModel {
    config: LlmConfig,
}

impl HostedModel {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LanguageModel for HostedModel {
    async fn stream_text(&self, request: ModelRequest) -> Result<TextStream, LlmError> {
        let backend = map_backend(&self.config.provider)?;
        // Ollama is the only keyless backend
        if self.config.api_key.is_none() && !matches!(backend, LLMBackend::Ollama) {
            return Err(LlmError::NotConfigured("LLM_API_KEY is not set"));
        }

        let (messages, extra_system) = chat_messages(&request.messages);
        if messages.is_empty() {
            return Err(LlmError::EmptyConversation);
        }
        let system = std::iter::once(request.system)
            .chain(extra_system)
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.config.model)
            .system(system);
        if let Some(key) = &self.config.api_key {
            builder = builder.api_key(key);
        }
        if let Some(base) = &self.config.api_base {
            // Endpoints are joined onto the base, so it must end in a slash
            builder = builder.base_url(format!("{}/", base.trim_end_matches('/')));
        }
        let provider = builder.build()?;

        tracing::debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            turns = messages.len(),
            "starting chat stream"
        );
        let stream = provider.chat_stream(&messages).await?;
        Ok(stream.map(|chunk| chunk.map_err(LlmError::from)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::chat::{ChatRole, MessageType};

    fn config(provider: &str, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.into(),
            api_base: Some("http://127.0.0.1:9".into()),
            api_key: api_key.map(str::to_string),
            model: "m".into(),
        }
    }

    #[test]
    fn providers_map_case_insensitively() {
        assert!(matches!(map_backend("OpenAI"), Ok(LLMBackend::OpenAI)));
        assert!(matches!(map_backend(" ollama "), Ok(LLMBackend::Ollama)));
        assert!(matches!(
            map_backend("watson"),
            Err(LlmError::UnknownProvider(name)) if name == "watson"
        ));
    }

    #[test]
    fn images_follow_the_user_text() {
        let turns = vec![
            ModelMessage {
                role: ModelRole::System,
                content: vec![ContentPart::Text("Answer in Filipino".into())],
            },
            ModelMessage {
                role: ModelRole::User,
                content: vec![
                    ContentPart::Text("Compare these".into()),
                    ContentPart::Image {
                        url: "https://ik.imagekit.io/demo/a.jpg".into(),
                        media_type: Some("image/jpeg".into()),
                    },
                ],
            },
            ModelMessage {
                role: ModelRole::Assistant,
                content: vec![ContentPart::Text("Sure".into())],
            },
        ];
        let (messages, system) = chat_messages(&turns);
        assert_eq!(system, vec!["Answer in Filipino".to_string()]);
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0].role, ChatRole::User));
        assert_eq!(messages[0].content, "Compare these");
        assert!(matches!(
            &messages[1].message_type,
            MessageType::ImageURL(url) if url == "https://ik.imagekit.io/demo/a.jpg"
        ));
        assert!(matches!(messages[2].role, ChatRole::Assistant));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let model = HostedModel::new(config("openai", None));
        let result = model
            .stream_text(ModelRequest {
                system: "s".into(),
                messages: vec![ModelMessage::user_text("hi")],
            })
            .await;
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let model = HostedModel::new(config("watson", Some("k")));
        let result = model
            .stream_text(ModelRequest {
                system: "s".into(),
                messages: vec![ModelMessage::user_text("hi")],
            })
            .await;
        assert!(matches!(result, Err(LlmError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn empty_conversation_is_rejected() {
        let model = HostedModel::new(config("openai", Some("k")));
        let result = model
            .stream_text(ModelRequest {
                system: "s".into(),
                messages: vec![],
            })
            .await;
        assert!(matches!(result, Err(LlmError::EmptyConversation)));
    }
}
