//! Effects produced by state transitions

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Optimistically append the user's message to the chat
    AppendUserMessage { message_id: String, text: String },

    /// Open a model stream over the chat's full history
    RequestStream,

    /// Append an empty, streaming assistant message
    AppendPlaceholder { message_id: String },

    /// Append a fragment to the streaming message
    AppendFragment { message_id: String, text: String },

    /// Seal the streaming message and extract code from it
    Finalize { message_id: String },

    /// Best-effort durable write of the user message and the reply
    PersistExchange {
        user_message_id: String,
        assistant_message_id: String,
    },

    /// Drop the placeholder without replacing it
    DiscardPlaceholder { message_id: String },

    /// Overwrite the placeholder with the apology text
    ReplaceWithApology { message_id: String },

    /// Append a fresh apology message (no placeholder existed)
    AppendApology,

    /// Give the chat's send slot back so it can be used again
    ReleaseSlot,
}

impl Effect {
    pub fn append_user_message(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Effect::AppendUserMessage {
            message_id: message_id.into(),
            text: text.into(),
        }
    }

    pub fn persist_exchange(
        user_message_id: impl Into<String>,
        assistant_message_id: impl Into<String>,
    ) -> Self {
        Effect::PersistExchange {
            user_message_id: user_message_id.into(),
            assistant_message_id: assistant_message_id.into(),
        }
    }

    /// True for effects that put an apology in front of the user
    pub fn is_apology(&self) -> bool {
        matches!(self, Effect::ReplaceWithApology { .. } | Effect::AppendApology)
    }
}
