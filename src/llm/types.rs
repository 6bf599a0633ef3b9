//! Request and stream types shared by model gateways

use super::LlmError;
use crate::chat::{Chat, Role};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

/// Live sequence of text fragments. `None` is the end-of-stream signal.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// One message as the generator sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered conversation handed to a gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatTurn>,
    /// Opaque correlation id for out-of-band bookkeeping
    pub conversation_id: Option<String>,
}

impl GenerationRequest {
    /// Project a chat's history onto `{role, content}` turns.
    ///
    /// Nothing is added or dropped; the system prompt, if any, belongs to the
    /// gateway.
    pub fn from_chat(chat: &Chat) -> Self {
        Self {
            messages: chat
                .messages
                .iter()
                .map(|m| ChatTurn {
                    role: m.role,
                    content: m.content.text.clone(),
                })
                .collect(),
            conversation_id: Some(chat.id.clone()),
        }
    }

    #[cfg(test)]
    pub(crate) fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}
