//! Runtime for executing send operations
//!
//! `ChatService` is the entry point: it owns the conversation store, the
//! per-chat send slots, and the background persistence writer, and runs each
//! send through the state machine executor.

mod executor;
pub mod traits;
mod writer;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::chat::{Chat, ChatSummary};
use crate::extract::CodeBlock;
use crate::state_machine::{
    transition, Event, SendContext, SendState, TransitionError, TransitionResult,
};
use crate::store::{ConversationStore, StoreResult};
use executor::SendOperation;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use writer::PersistenceWriter;

/// Service over boxed gateways, as shared by the HTTP layer
pub type DynChatService = ChatService<dyn ModelGateway, dyn PersistenceGateway>;

/// Why a send did not produce an outcome
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Message must not be empty")]
    InvalidInput,
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
    #[error("A reply is already streaming for chat {0}")]
    Busy(String),
    #[error("Send was cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// What a finished send left in the chat.
///
/// Stream failures are not errors: they finish with `failed` set and the
/// apology as the final assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub chat_id: String,
    pub user_message_id: String,
    pub assistant_message_id: String,
    pub final_assistant_text: String,
    /// Every fenced block joined with a blank line, or `None` when there are none
    pub extracted_code: Option<String>,
    pub code_blocks: Vec<CodeBlock>,
    pub failed: bool,
}

// ============================================================================
// Send slots
// ============================================================================

struct ActiveSend {
    state: SendState,
    cancel: CancellationToken,
    generation: u64,
}

#[derive(Default)]
struct SlotTable {
    active: HashMap<String, ActiveSend>,
    next_generation: u64,
}

/// At most one send per chat. A chat without an entry is `Idle`.
#[derive(Default)]
pub struct SendSlots {
    table: Mutex<SlotTable>,
}

impl SendSlots {
    fn lock(&self) -> MutexGuard<'_, SlotTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the opening transition and claim the slot in one atomic step
    fn acquire(
        self: &Arc<Self>,
        context: &SendContext,
        event: Event,
    ) -> Result<(TransitionResult, SlotGuard), TransitionError> {
        let mut table = self.lock();
        let current = table
            .active
            .get(&context.chat_id)
            .map(|a| a.state.clone())
            .unwrap_or_default();
        let result = transition(&current, context, event)?;

        table.next_generation += 1;
        let generation = table.next_generation;
        let cancel = CancellationToken::new();
        table.active.insert(
            context.chat_id.clone(),
            ActiveSend {
                state: result.new_state.clone(),
                cancel: cancel.clone(),
                generation,
            },
        );

        Ok((
            result,
            SlotGuard {
                slots: Arc::clone(self),
                chat_id: context.chat_id.clone(),
                cancel,
                generation,
            },
        ))
    }

    fn update(&self, chat_id: &str, generation: u64, state: &SendState) {
        if let Some(active) = self.lock().active.get_mut(chat_id) {
            if active.generation == generation {
                active.state = state.clone();
            }
        }
    }

    fn release(&self, chat_id: &str, generation: u64) {
        let mut table = self.lock();
        if table
            .active
            .get(chat_id)
            .is_some_and(|a| a.generation == generation)
        {
            table.active.remove(chat_id);
        }
    }

    /// Signal the chat's running send to stop; false if none is running
    pub fn cancel(&self, chat_id: &str) -> bool {
        match self.lock().active.get(chat_id) {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn state(&self, chat_id: &str) -> SendState {
        self.lock()
            .active
            .get(chat_id)
            .map(|a| a.state.clone())
            .unwrap_or_default()
    }

    pub fn is_active(&self, chat_id: &str) -> bool {
        self.lock().active.contains_key(chat_id)
    }
}

/// Owned claim on a chat's slot, released on every exit path
pub(crate) struct SlotGuard {
    slots: Arc<SendSlots>,
    chat_id: String,
    cancel: CancellationToken,
    generation: u64,
}

impl SlotGuard {
    pub(crate) fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn update(&self, state: &SendState) {
        self.slots.update(&self.chat_id, self.generation, state);
    }

    pub(crate) fn release(&self) {
        self.slots.release(&self.chat_id, self.generation);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// Chat service
// ============================================================================

/// Chat lifecycle plus streamed sends, over a shared conversation store
pub struct ChatService<M, P>
where
    M: ModelGateway + ?Sized + 'static,
    P: PersistenceGateway + ?Sized + 'static,
{
    store: Arc<ConversationStore>,
    model: Arc<M>,
    persistence: Arc<P>,
    slots: Arc<SendSlots>,
    writer: PersistenceWriter,
}

impl<M, P> ChatService<M, P>
where
    M: ModelGateway + ?Sized + 'static,
    P: PersistenceGateway + ?Sized + 'static,
{
    /// Must be called inside a tokio runtime; spawns the persistence writer.
    pub fn new(store: Arc<ConversationStore>, model: Arc<M>, persistence: Arc<P>) -> Self {
        let writer = PersistenceWriter::spawn(Arc::clone(&persistence));
        Self {
            store,
            model,
            persistence,
            slots: Arc::new(SendSlots::default()),
            writer,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Replace the store's contents with what persistence holds
    pub async fn load(&self) -> Result<usize, PersistenceError> {
        let chats = self.persistence.list_chats().await?;
        let count = chats.len();
        self.store.hydrate(chats);
        tracing::info!(chats = count, "Loaded chats from persistence");
        Ok(count)
    }

    /// Wait until every queued persistence write has been attempted
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    // ==================== Chat lifecycle ====================

    pub fn list_chats(&self) -> Vec<ChatSummary> {
        self.store.list_chats()
    }

    pub fn get_chat(&self, chat_id: &str) -> StoreResult<Chat> {
        self.store.get(chat_id)
    }

    pub fn create_chat(&self, title: Option<&str>) -> Chat {
        let chat = self.store.create(title);
        self.writer.create_chat(chat.clone());
        chat
    }

    pub fn select_chat(&self, chat_id: &str) -> StoreResult<Chat> {
        self.store.select(chat_id)
    }

    pub fn current_chat(&self) -> Option<Chat> {
        self.store.current()
    }

    pub fn rename_chat(&self, chat_id: &str, title: &str) -> StoreResult<Chat> {
        let chat = self.store.rename(chat_id, title)?;
        self.writer.rename_chat(chat_id, &chat.title);
        Ok(chat)
    }

    /// Delete a chat. A send still running on it is stopped and its late
    /// fragments are dropped.
    pub fn delete_chat(&self, chat_id: &str) -> StoreResult<Chat> {
        let removed = self.store.delete(chat_id)?;
        if self.slots.cancel(chat_id) {
            tracing::info!(chat_id = %chat_id, "Stopped send on deleted chat");
        }
        self.writer.delete_chat(chat_id);
        Ok(removed)
    }

    // ==================== Sending ====================

    pub fn is_sending(&self, chat_id: &str) -> bool {
        self.slots.is_active(chat_id)
    }

    pub fn send_state(&self, chat_id: &str) -> SendState {
        self.slots.state(chat_id)
    }

    /// Ask the chat's running send to stop. Returns false if none is running.
    pub fn cancel(&self, chat_id: &str) -> bool {
        self.slots.cancel(chat_id)
    }

    /// Append the user's message, stream the reply into the chat, and
    /// finalize it.
    ///
    /// The operation runs on its own task and always reaches a terminal state,
    /// even if the caller stops waiting for it.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<SendOutcome, SendError> {
        if text.trim().is_empty() {
            return Err(SendError::InvalidInput);
        }
        if !self.store.contains(chat_id) {
            return Err(SendError::ChatNotFound(chat_id.to_string()));
        }

        let context = SendContext::new(chat_id);
        let user_message_id = uuid::Uuid::new_v4().to_string();
        let event = Event::UserMessage {
            message_id: user_message_id.clone(),
            text: text.to_string(),
        };

        let (initial, slot) = self.slots.acquire(&context, event).map_err(|e| match e {
            TransitionError::Busy => SendError::Busy(chat_id.to_string()),
            TransitionError::EmptyMessage => SendError::InvalidInput,
            TransitionError::InvalidTransition(msg) => SendError::Internal(msg),
        })?;

        let operation = SendOperation::new(
            context,
            user_message_id,
            Arc::clone(&self.store),
            Arc::clone(&self.model),
            self.writer.clone(),
            slot,
        );
        match tokio::spawn(operation.run(initial)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(chat_id = %chat_id, error = %e, "Send task failed");
                Err(SendError::Internal(e.to_string()))
            }
        }
    }
}
