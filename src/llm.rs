//! Model gateway implementations
//!
//! Production access to an `OpenAI`-compatible chat completion endpoint, plus a
//! logging wrapper usable around any gateway.

mod error;
mod openai;
mod stream;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAiGateway;
pub use stream::decode_event_stream;
pub use types::*;

use crate::runtime::ModelGateway;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Default instructions sent ahead of every conversation
pub const SYSTEM_PROMPT: &str = "You are an expert AI coding assistant. You help users with:
- Writing, debugging, and explaining code
- Code reviews and optimization suggestions
- Architecture and design patterns
- Best practices and conventions
- Problem-solving and algorithm design

Always provide clear, well-commented code examples and explain your reasoning.";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Configuration for the completion endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup; blank values count as unset
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: var("CODER_CHAT_MODEL").unwrap_or(defaults.model),
            ..defaults
        }
    }
}

/// Logging wrapper for model gateways
pub struct LoggingGateway {
    inner: Arc<dyn ModelGateway>,
}

impl LoggingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ModelGateway for LoggingGateway {
    async fn open_stream(&self, request: &GenerationRequest) -> Result<FragmentStream, LlmError> {
        let start = Instant::now();
        let chat_id = request.conversation_id.clone().unwrap_or_default();
        let result = self.inner.open_stream(request).await;

        match result {
            Ok(stream) => {
                tracing::info!(
                    chat_id = %chat_id,
                    turns = request.messages.len(),
                    open_ms = %start.elapsed().as_millis(),
                    "Model stream opened"
                );
                let logged = stream.inspect(move |item| {
                    if let Err(e) = item {
                        tracing::warn!(
                            chat_id = %chat_id,
                            kind = e.kind.as_str(),
                            error = %e.message,
                            "Model stream broke off"
                        );
                    }
                });
                Ok(Box::pin(logged))
            }
            Err(e) => {
                tracing::error!(
                    chat_id = %chat_id,
                    open_ms = %start.elapsed().as_millis(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    "Model stream failed to open"
                );
                Err(e)
            }
        }
    }
}
