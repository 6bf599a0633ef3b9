//! API request and response types

use crate::chat::{Chat, ChatSummary, Message};
use crate::state_machine::SendState;
use serde::{Deserialize, Serialize};

/// Request to create a new chat
#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// Request to rename a chat
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Response with a list of chats
#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
}

/// Response with a single chat
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: Chat,
    pub send_state: SendState,
}

/// Response with a chat's messages
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
