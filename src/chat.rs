//! Chat and message types
//!
//! These are the in-memory records the store owns and the persistence
//! gateway mirrors.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canned assistant message seeded into every new chat
pub const GREETING: &str = "Hello! I'm your AI coding assistant. I can help you generate, modify, and explain code. What would you like to work on?";

/// Assistant text shown in place of a reply that failed to stream
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message body.
///
/// A single text type with an explicit streaming flag. While `streaming` is
/// set the text only ever grows; once cleared it never changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
}

impl MessageContent {
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            streaming: false,
        }
    }

    pub fn streaming() -> Self {
        Self {
            text: String::new(),
            streaming: true,
        }
    }
}

/// One turn in a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: MessageContent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            created_at,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    pub fn is_streaming(&self) -> bool {
        self.content.streaming
    }
}

/// A conversation: ordered messages plus metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// New chat seeded with the assistant greeting
    pub fn seeded(title: Option<&str>, now: DateTime<Utc>) -> Self {
        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => default_title(now),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            messages: vec![Message::new(
                Role::Assistant,
                MessageContent::finalized(GREETING),
                now,
            )],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// The message currently receiving fragments, if any
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_streaming())
    }

    /// Timestamp for the next appended message.
    ///
    /// Clamped so message order by `created_at` always matches append order.
    pub fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.messages.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Listing entry for a chat, without its messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Title used when the caller does not provide one
pub fn default_title(now: DateTime<Utc>) -> String {
    format!(
        "Chat {}",
        now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    )
}
