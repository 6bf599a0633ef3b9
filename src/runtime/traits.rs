//! Trait abstractions for runtime I/O
//!
//! These traits let the send executor run against mock implementations.

use crate::chat::{Chat, Message};
use crate::llm::{FragmentStream, GenerationRequest, LlmError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Source of streamed assistant replies
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Open a reply stream for the chat history in `request`.
    ///
    /// Failures to open surface here; failures mid-stream surface as error
    /// items on the returned stream.
    async fn open_stream(&self, request: &GenerationRequest) -> Result<FragmentStream, LlmError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Chat not found: {0}")]
    NotFound(String),
    #[error("Persistence backend error: {0}")]
    Backend(String),
}

/// Durable storage for chats. Ids are minted by the conversation store and
/// recorded verbatim.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, PersistenceError>;

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, PersistenceError>;

    /// All chats with their messages, most recently updated first
    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError>;

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<Chat, PersistenceError>;

    /// Returns whether the chat existed
    async fn delete_chat(&self, chat_id: &str) -> Result<bool, PersistenceError>;

    async fn append_message(
        &self,
        chat_id: &str,
        message: &Message,
    ) -> Result<Message, PersistenceError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ModelGateway + ?Sized> ModelGateway for Arc<T> {
    async fn open_stream(&self, request: &GenerationRequest) -> Result<FragmentStream, LlmError> {
        (**self).open_stream(request).await
    }
}

#[async_trait]
impl<T: PersistenceGateway + ?Sized> PersistenceGateway for Arc<T> {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, PersistenceError> {
        (**self).create_chat(chat).await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, PersistenceError> {
        (**self).get_chat(chat_id).await
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError> {
        (**self).list_chats().await
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<Chat, PersistenceError> {
        (**self).rename_chat(chat_id, title).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<bool, PersistenceError> {
        (**self).delete_chat(chat_id).await
    }

    async fn append_message(
        &self,
        chat_id: &str,
        message: &Message,
    ) -> Result<Message, PersistenceError> {
        (**self).append_message(chat_id, message).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::{Database, DbError};

impl From<DbError> for PersistenceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ChatNotFound(id) => PersistenceError::NotFound(id),
            other => PersistenceError::Backend(other.to_string()),
        }
    }
}

/// Adapter to use Database as a persistence gateway
#[derive(Clone)]
pub struct DatabasePersistence {
    db: Database,
}

impl DatabasePersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PersistenceGateway for DatabasePersistence {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, PersistenceError> {
        Ok(self.db.create_chat(chat)?)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, PersistenceError> {
        Ok(self.db.get_chat(chat_id)?)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError> {
        Ok(self.db.list_chats()?)
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<Chat, PersistenceError> {
        Ok(self.db.rename_chat(chat_id, title)?)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<bool, PersistenceError> {
        Ok(self.db.delete_chat(chat_id)?)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        message: &Message,
    ) -> Result<Message, PersistenceError> {
        Ok(self.db.append_message(chat_id, message)?)
    }
}
