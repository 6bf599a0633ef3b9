//! Send operation state types

use serde::{Deserialize, Serialize};

/// Where a chat's send operation currently stands.
///
/// Only `Idle` accepts a new user message. `Finalized` and `Failed` are
/// terminal for one operation; releasing the slot returns the chat to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SendState {
    #[default]
    Idle,

    /// User message appended, waiting for the stream to open
    Sending { user_message_id: String },

    /// Placeholder assistant message is receiving fragments
    Streaming {
        user_message_id: String,
        assistant_message_id: String,
        fragments: u32,
    },

    /// Stream ended; the reply is being sealed and scanned for code
    Finalizing {
        user_message_id: String,
        assistant_message_id: String,
    },

    Finalized {
        user_message_id: String,
        assistant_message_id: String,
    },

    Failed { message: String },
}

impl SendState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SendState::Idle)
    }

    /// True while the operation holds the chat's send slot
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SendState::Sending { .. } | SendState::Streaming { .. } | SendState::Finalizing { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SendState::Finalized { .. } | SendState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SendState::Idle => "idle",
            SendState::Sending { .. } => "sending",
            SendState::Streaming { .. } => "streaming",
            SendState::Finalizing { .. } => "finalizing",
            SendState::Finalized { .. } => "finalized",
            SendState::Failed { .. } => "failed",
        }
    }

    /// Id of the placeholder assistant message, if one exists yet
    pub fn assistant_message_id(&self) -> Option<&str> {
        match self {
            SendState::Streaming {
                assistant_message_id,
                ..
            }
            | SendState::Finalizing {
                assistant_message_id,
                ..
            }
            | SendState::Finalized {
                assistant_message_id,
                ..
            } => Some(assistant_message_id),
            _ => None,
        }
    }
}

/// Fixed facts about the operation, available to every transition
#[derive(Debug, Clone)]
pub struct SendContext {
    pub chat_id: String,
}

impl SendContext {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
        }
    }
}
