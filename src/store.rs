//! In-memory conversation store
//!
//! The single mutable structure shared by the send runtime and the chat
//! management operations. Every mutation is applied under one write lock and
//! then published as a full chat snapshot, so readers and subscribers never
//! observe a half-applied change.

use crate::chat::{default_title, Chat, ChatSummary, Message, MessageContent, Role};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    NotFound(String),
    #[error("Message not found: {0}")]
    MessageNotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Change notifications published after each mutation
#[derive(Debug, Clone)]
pub enum StoreEvent {
    ChatUpdated { chat: Chat },
    ChatDeleted { chat_id: String },
}

impl StoreEvent {
    pub fn chat_id(&self) -> &str {
        match self {
            StoreEvent::ChatUpdated { chat } => &chat.id,
            StoreEvent::ChatDeleted { chat_id } => chat_id,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    chats: HashMap<String, Chat>,
    current_chat_id: Option<String>,
}

/// Authoritative collection of chats plus the current selection
pub struct ConversationStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    // A panic while holding the lock cannot leave a chat half-mutated (every
    // mutation is a single assignment or push), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ==================== Queries ====================

    /// Chat summaries, most recently updated first
    pub fn list_chats(&self) -> Vec<ChatSummary> {
        let state = self.read();
        let mut summaries: Vec<ChatSummary> = state.chats.values().map(Chat::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Snapshot of a chat without changing the selection
    pub fn get(&self, chat_id: &str) -> StoreResult<Chat> {
        self.read()
            .chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.read().chats.contains_key(chat_id)
    }

    pub fn current_chat_id(&self) -> Option<String> {
        self.read().current_chat_id.clone()
    }

    pub fn current(&self) -> Option<Chat> {
        let state = self.read();
        state
            .current_chat_id
            .as_ref()
            .and_then(|id| state.chats.get(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ==================== Chat management ====================

    /// Make a chat current and return its snapshot
    pub fn select(&self, chat_id: &str) -> StoreResult<Chat> {
        let mut state = self.write();
        let chat = state
            .chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))?;
        state.current_chat_id = Some(chat.id.clone());
        Ok(chat)
    }

    /// Create a chat seeded with the greeting and make it current
    pub fn create(&self, title: Option<&str>) -> Chat {
        let chat = Chat::seeded(title, Utc::now());
        {
            let mut state = self.write();
            state.chats.insert(chat.id.clone(), chat.clone());
            state.current_chat_id = Some(chat.id.clone());
            self.publish(StoreEvent::ChatUpdated { chat: chat.clone() });
        }
        tracing::debug!(chat_id = %chat.id, title = %chat.title, "Chat created");
        chat
    }

    /// Retitle a chat; a blank title falls back to the generated default
    pub fn rename(&self, chat_id: &str, title: &str) -> StoreResult<Chat> {
        let title = title.trim();
        self.mutate(chat_id, |chat| {
            let now = Utc::now();
            chat.title = if title.is_empty() {
                default_title(now)
            } else {
                title.to_string()
            };
            chat.touch(now);
            Ok(())
        })
    }

    /// Remove a chat, clearing the selection if it pointed at it
    pub fn delete(&self, chat_id: &str) -> StoreResult<Chat> {
        let mut state = self.write();
        let removed = state
            .chats
            .remove(chat_id)
            .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))?;
        if state.current_chat_id.as_deref() == Some(chat_id) {
            state.current_chat_id = None;
        }
        self.publish(StoreEvent::ChatDeleted {
            chat_id: chat_id.to_string(),
        });
        Ok(removed)
    }

    /// Replace all chats with ones loaded from persistence.
    ///
    /// Messages left mid-stream by a previous process are finalised as-is.
    pub fn hydrate(&self, chats: Vec<Chat>) {
        let mut state = self.write();
        state.chats = chats
            .into_iter()
            .map(|mut chat| {
                for message in &mut chat.messages {
                    message.content.streaming = false;
                }
                (chat.id.clone(), chat)
            })
            .collect();
        if let Some(current) = state.current_chat_id.clone() {
            if !state.chats.contains_key(&current) {
                state.current_chat_id = None;
            }
        }
    }

    // ==================== Message mutation ====================

    /// Apply `f` to a chat under the write lock and publish the result
    fn mutate(
        &self,
        chat_id: &str,
        f: impl FnOnce(&mut Chat) -> StoreResult<()>,
    ) -> StoreResult<Chat> {
        let mut state = self.write();
        let chat = state
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| StoreError::NotFound(chat_id.to_string()))?;
        f(chat)?;
        let snapshot = chat.clone();
        // Published under the lock so subscribers see mutations in order
        self.publish(StoreEvent::ChatUpdated {
            chat: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Append a new message under a caller-minted id; returns it as stored
    pub(crate) fn append_message(
        &self,
        chat_id: &str,
        message_id: &str,
        role: Role,
        content: MessageContent,
    ) -> StoreResult<Message> {
        let mut appended = None;
        self.mutate(chat_id, |chat| {
            let now = Utc::now();
            let message = Message::new(role, content, chat.next_timestamp(now)).with_id(message_id);
            chat.touch(message.created_at);
            chat.messages.push(message.clone());
            appended = Some(message);
            Ok(())
        })?;
        appended.ok_or_else(|| StoreError::NotFound(chat_id.to_string()))
    }

    /// Append a fragment to a streaming message
    pub(crate) fn append_to_message(
        &self,
        chat_id: &str,
        message_id: &str,
        fragment: &str,
    ) -> StoreResult<Chat> {
        self.mutate(chat_id, |chat| {
            let message = chat
                .message_mut(message_id)
                .filter(|m| m.is_streaming())
                .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
            message.content.text.push_str(fragment);
            chat.touch(Utc::now());
            Ok(())
        })
    }

    /// Mark a streaming message immutable; returns its final form
    pub(crate) fn finalize_message(&self, chat_id: &str, message_id: &str) -> StoreResult<Message> {
        let mut finalized = None;
        self.mutate(chat_id, |chat| {
            let message = chat
                .message_mut(message_id)
                .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
            message.content.streaming = false;
            finalized = Some(message.clone());
            chat.touch(Utc::now());
            Ok(())
        })?;
        finalized.ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))
    }

    /// Drop a message (used for abandoned placeholders)
    pub(crate) fn remove_message(&self, chat_id: &str, message_id: &str) -> StoreResult<Chat> {
        self.mutate(chat_id, |chat| {
            let before = chat.messages.len();
            chat.messages.retain(|m| m.id != message_id);
            if chat.messages.len() == before {
                return Err(StoreError::MessageNotFound(message_id.to_string()));
            }
            chat.touch(Utc::now());
            Ok(())
        })
    }

    /// Replace a streaming placeholder with finalized text in one step
    pub(crate) fn replace_message(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
    ) -> StoreResult<Message> {
        let mut replaced = None;
        self.mutate(chat_id, |chat| {
            let message = chat
                .message_mut(message_id)
                .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
            message.content = MessageContent::finalized(text);
            replaced = Some(message.clone());
            chat.touch(Utc::now());
            Ok(())
        })?;
        replaced.ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))
    }
}
