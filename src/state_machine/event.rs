//! Events that drive a send operation

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Caller events
    /// New user input; the id is minted before the transition so the
    /// transition stays pure
    UserMessage { message_id: String, text: String },
    Cancel,

    // Stream events
    StreamOpened { message_id: String },
    Fragment { text: String },
    StreamEnded,
    StreamFailed { message: String },

    // Runtime events
    /// The reply was sealed and scanned
    ReplyFinalized,
    /// The chat disappeared from the store mid-operation
    ChatGone,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::Cancel => "cancel",
            Event::StreamOpened { .. } => "stream_opened",
            Event::Fragment { .. } => "fragment",
            Event::StreamEnded => "stream_ended",
            Event::StreamFailed { .. } => "stream_failed",
            Event::ReplyFinalized => "reply_finalized",
            Event::ChatGone => "chat_gone",
        }
    }
}
