//! Background persistence writer
//!
//! Durable writes are best-effort and never block the in-memory store. A
//! single task applies them in submission order so a chat is always created
//! before its messages are appended.

use super::traits::PersistenceGateway;
use crate::chat::{Chat, Message};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum WriteJob {
    CreateChat(Chat),
    RenameChat { chat_id: String, title: String },
    DeleteChat { chat_id: String },
    /// Messages appended one after another, in order
    AppendMessages {
        chat_id: String,
        messages: Vec<Message>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle for queueing writes; cheap to clone
#[derive(Clone)]
pub(crate) struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl PersistenceWriter {
    pub(crate) fn spawn<P: PersistenceGateway + ?Sized + 'static>(persistence: Arc<P>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(persistence, rx));
        Self { tx }
    }

    fn submit(&self, job: WriteJob) {
        if self.tx.send(job).is_err() {
            tracing::warn!("Persistence writer has stopped; dropping write");
        }
    }

    pub(crate) fn create_chat(&self, chat: Chat) {
        self.submit(WriteJob::CreateChat(chat));
    }

    pub(crate) fn rename_chat(&self, chat_id: &str, title: &str) {
        self.submit(WriteJob::RenameChat {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
        });
    }

    pub(crate) fn delete_chat(&self, chat_id: &str) {
        self.submit(WriteJob::DeleteChat {
            chat_id: chat_id.to_string(),
        });
    }

    pub(crate) fn append_messages(&self, chat_id: &str, messages: Vec<Message>) {
        self.submit(WriteJob::AppendMessages {
            chat_id: chat_id.to_string(),
            messages,
        });
    }

    /// Resolves once every write queued before this call has been attempted
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(WriteJob::Flush(done_tx));
        let _ = done_rx.await;
    }
}

async fn run<P: PersistenceGateway + ?Sized>(
    persistence: Arc<P>,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::CreateChat(chat) => {
                if let Err(e) = persistence.create_chat(&chat).await {
                    tracing::warn!(chat_id = %chat.id, error = %e, "Failed to persist new chat");
                }
            }
            WriteJob::RenameChat { chat_id, title } => {
                if let Err(e) = persistence.rename_chat(&chat_id, &title).await {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Failed to persist rename");
                }
            }
            WriteJob::DeleteChat { chat_id } => match persistence.delete_chat(&chat_id).await {
                Ok(false) => tracing::debug!(chat_id = %chat_id, "Chat was never persisted"),
                Ok(true) => {}
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Failed to persist delete");
                }
            },
            WriteJob::AppendMessages { chat_id, messages } => {
                for message in &messages {
                    if let Err(e) = persistence.append_message(&chat_id, message).await {
                        tracing::warn!(
                            chat_id = %chat_id,
                            message_id = %message.id,
                            error = %e,
                            "Failed to persist message"
                        );
                    }
                }
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Persistence writer stopped");
}
