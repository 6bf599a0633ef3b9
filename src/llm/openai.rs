//! Streaming client for `OpenAI`-compatible chat completion endpoints

use super::stream::decode_event_stream;
use super::{FragmentStream, GenerationRequest, LlmConfig, LlmError};
use crate::runtime::ModelGateway;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// `OpenAI` chat completions, consumed as an event stream
pub struct OpenAiGateway {
    client: Client,
    api_key: Option<String>,
    url: String,
    config: LlmConfig,
}

impl OpenAiGateway {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        // No overall timeout: a long reply is bounded by the transport only
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn translate_request<'a>(&'a self, request: &'a GenerationRequest) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !self.config.system_prompt.is_empty() {
            messages.push(CompletionMessage {
                role: "system",
                content: &self.config.system_prompt,
            });
        }
        messages.extend(request.messages.iter().map(|turn| CompletionMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));

        CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: true,
            user: request.conversation_id.as_deref(),
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn open_stream(&self, request: &GenerationRequest) -> Result<FragmentStream, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::auth("OPENAI_API_KEY is not set"))?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&self.translate_request(request))
            .send()
            .await
            .map_err(|e| LlmError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}
