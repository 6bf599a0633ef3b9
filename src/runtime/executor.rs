//! Send operation executor
//!
//! Feeds events through the pure transition function and carries out the
//! effects it returns against the store, the model, and the writer.

use super::traits::ModelGateway;
use super::writer::PersistenceWriter;
use super::{SendError, SendOutcome, SlotGuard};

use crate::chat::{Message, MessageContent, Role, APOLOGY};
use crate::extract::{extract_code_blocks, join_code_blocks, CodeBlock};
use crate::llm::{FragmentStream, GenerationRequest};
use crate::state_machine::{transition, Effect, Event, SendContext, SendState, TransitionResult};
use crate::store::ConversationStore;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;

/// One user message and the reply streamed for it
pub(crate) struct SendOperation<M: ModelGateway + ?Sized + 'static> {
    context: SendContext,
    state: SendState,
    user_message_id: String,
    store: Arc<ConversationStore>,
    model: Arc<M>,
    writer: PersistenceWriter,
    slot: SlotGuard,
    stream: Option<FragmentStream>,
    user_message: Option<Message>,
    /// Finalized reply or apology
    reply: Option<Message>,
    code_blocks: Vec<CodeBlock>,
    /// Set by the event that ended the operation without a reply
    ending: Option<SendError>,
    outcome: Option<Result<SendOutcome, SendError>>,
}

impl<M: ModelGateway + ?Sized + 'static> SendOperation<M> {
    pub(crate) fn new(
        context: SendContext,
        user_message_id: String,
        store: Arc<ConversationStore>,
        model: Arc<M>,
        writer: PersistenceWriter,
        slot: SlotGuard,
    ) -> Self {
        Self {
            context,
            state: SendState::Idle,
            user_message_id,
            store,
            model,
            writer,
            slot,
            stream: None,
            user_message: None,
            reply: None,
            code_blocks: Vec::new(),
            ending: None,
            outcome: None,
        }
    }

    /// Drive the operation to completion starting from the slot-claiming
    /// transition.
    pub(crate) async fn run(mut self, initial: TransitionResult) -> Result<SendOutcome, SendError> {
        tracing::info!(chat_id = %self.context.chat_id, "Starting send");

        let mut pending: VecDeque<Event> = self.apply(initial).await.into_iter().collect();
        loop {
            if let Some(outcome) = self.outcome.take() {
                match &outcome {
                    Ok(o) => tracing::info!(
                        chat_id = %self.context.chat_id,
                        failed = o.failed,
                        code_blocks = o.code_blocks.len(),
                        "Send finished"
                    ),
                    Err(e) => tracing::info!(
                        chat_id = %self.context.chat_id,
                        reason = %e,
                        "Send ended without a reply"
                    ),
                }
                return outcome;
            }

            let event = match pending.pop_front() {
                Some(event) => event,
                None => self.next_stream_event().await,
            };
            self.process_event(event, &mut pending).await;
        }
    }

    async fn process_event(&mut self, event: Event, pending: &mut VecDeque<Event>) {
        let ending = match &event {
            Event::Cancel => Some(SendError::Cancelled),
            Event::ChatGone => Some(SendError::ChatNotFound(self.context.chat_id.clone())),
            _ => None,
        };

        match transition(&self.state, &self.context, event) {
            Ok(result) => {
                if ending.is_some() {
                    self.ending = ending;
                }
                pending.extend(self.apply(result).await);
            }
            Err(e) => {
                tracing::error!(
                    chat_id = %self.context.chat_id,
                    state = self.state.name(),
                    error = %e,
                    "Send transition rejected"
                );
                self.stream = None;
                self.slot.release();
                self.outcome = Some(Err(SendError::Internal(e.to_string())));
            }
        }
    }

    /// Adopt the new state and execute its effects in order
    async fn apply(&mut self, result: TransitionResult) -> Vec<Event> {
        tracing::debug!(
            chat_id = %self.context.chat_id,
            from = self.state.name(),
            to = result.new_state.name(),
            "Send state transition"
        );
        self.state = result.new_state;
        self.slot.update(&self.state);

        let mut generated = Vec::new();
        for effect in result.effects {
            if let Some(event) = self.execute_effect(effect).await {
                generated.push(event);
            }
        }
        generated
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        let chat_id = self.context.chat_id.clone();
        match effect {
            Effect::AppendUserMessage { message_id, text } => {
                match self.store.append_message(
                    &chat_id,
                    &message_id,
                    Role::User,
                    MessageContent::finalized(text),
                ) {
                    Ok(message) => {
                        self.user_message = Some(message);
                        None
                    }
                    Err(_) => Some(Event::ChatGone),
                }
            }

            Effect::RequestStream => {
                let Ok(chat) = self.store.get(&chat_id) else {
                    return Some(Event::ChatGone);
                };
                let request = GenerationRequest::from_chat(&chat);
                let cancel = self.slot.cancelled();

                let opened = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Some(self.stop_event()),
                    opened = self.model.open_stream(&request) => opened,
                };

                match opened {
                    Ok(stream) => {
                        self.stream = Some(stream);
                        Some(Event::StreamOpened {
                            message_id: uuid::Uuid::new_v4().to_string(),
                        })
                    }
                    Err(e) => Some(Event::StreamFailed {
                        message: e.to_string(),
                    }),
                }
            }

            Effect::AppendPlaceholder { message_id } => self
                .store
                .append_message(
                    &chat_id,
                    &message_id,
                    Role::Assistant,
                    MessageContent::streaming(),
                )
                .err()
                .map(|_| Event::ChatGone),

            Effect::AppendFragment { message_id, text } => self
                .store
                .append_to_message(&chat_id, &message_id, &text)
                .err()
                .map(|_| Event::ChatGone),

            Effect::Finalize { message_id } => {
                self.stream = None;
                match self.store.finalize_message(&chat_id, &message_id) {
                    Ok(message) => {
                        self.code_blocks = extract_code_blocks(message.text());
                        tracing::info!(
                            chat_id = %chat_id,
                            chars = message.text().len(),
                            code_blocks = self.code_blocks.len(),
                            "Reply finalized"
                        );
                        self.reply = Some(message);
                        Some(Event::ReplyFinalized)
                    }
                    Err(_) => Some(Event::ChatGone),
                }
            }

            Effect::PersistExchange { .. } => {
                if let (Some(user), Some(reply)) = (&self.user_message, &self.reply) {
                    self.writer
                        .append_messages(&chat_id, vec![user.clone(), reply.clone()]);
                }
                None
            }

            Effect::DiscardPlaceholder { message_id } => {
                if let Err(e) = self.store.remove_message(&chat_id, &message_id) {
                    tracing::debug!(chat_id = %chat_id, error = %e, "Placeholder already gone");
                }
                None
            }

            Effect::ReplaceWithApology { message_id } => {
                self.log_failure();
                match self.store.replace_message(&chat_id, &message_id, APOLOGY) {
                    Ok(message) => self.reply = Some(message),
                    Err(e) => {
                        tracing::debug!(chat_id = %chat_id, error = %e, "No placeholder to replace");
                    }
                }
                None
            }

            Effect::AppendApology => {
                self.log_failure();
                let message_id = uuid::Uuid::new_v4().to_string();
                match self.store.append_message(
                    &chat_id,
                    &message_id,
                    Role::Assistant,
                    MessageContent::finalized(APOLOGY),
                ) {
                    Ok(message) => self.reply = Some(message),
                    Err(e) => {
                        tracing::debug!(chat_id = %chat_id, error = %e, "Chat gone before apology");
                    }
                }
                None
            }

            Effect::ReleaseSlot => {
                self.stream = None;
                self.slot.release();
                self.outcome = Some(self.build_outcome());
                None
            }
        }
    }

    /// Next event from the open stream, or the stop signal, whichever is first
    async fn next_stream_event(&mut self) -> Event {
        let cancel = self.slot.cancelled();
        let Some(stream) = self.stream.as_mut() else {
            return Event::StreamFailed {
                message: "No open stream".to_string(),
            };
        };

        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            item = stream.next() => Some(item),
        };

        match item {
            None => self.stop_event(),
            Some(Some(Ok(text))) => Event::Fragment { text },
            Some(Some(Err(e))) => Event::StreamFailed {
                message: e.to_string(),
            },
            Some(None) => Event::StreamEnded,
        }
    }

    /// A stop request on a chat that no longer exists is a deletion
    fn stop_event(&self) -> Event {
        if self.store.contains(&self.context.chat_id) {
            Event::Cancel
        } else {
            Event::ChatGone
        }
    }

    fn log_failure(&self) {
        if let SendState::Failed { message } = &self.state {
            tracing::warn!(chat_id = %self.context.chat_id, error = %message, "Reply failed");
        }
    }

    fn build_outcome(&mut self) -> Result<SendOutcome, SendError> {
        let failed = match &self.state {
            SendState::Finalized { .. } => false,
            SendState::Failed { .. } => true,
            _ => {
                return Err(self
                    .ending
                    .take()
                    .unwrap_or_else(|| SendError::ChatNotFound(self.context.chat_id.clone())))
            }
        };

        // The apology could not be shown because the chat vanished
        let Some(reply) = self.reply.take() else {
            return Err(SendError::ChatNotFound(self.context.chat_id.clone()));
        };

        let code_blocks = std::mem::take(&mut self.code_blocks);
        Ok(SendOutcome {
            chat_id: self.context.chat_id.clone(),
            user_message_id: self.user_message_id.clone(),
            assistant_message_id: reply.id,
            extracted_code: join_code_blocks(&code_blocks),
            code_blocks,
            final_assistant_text: reply.content.text,
            failed,
        })
    }
}
