//! Pure state transition function

use super::{Effect, Event, SendContext, SendState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SendState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SendState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("A reply is still streaming for this chat (cancel it first)")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs and performs no
/// I/O. Ids for new messages arrive inside events.
pub fn transition(
    state: &SendState,
    context: &SendContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User messages
        // ============================================================

        (SendState::Idle, Event::UserMessage { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyMessage)
        }

        // Idle + UserMessage -> Sending
        (SendState::Idle, Event::UserMessage { message_id, text }) => Ok(TransitionResult::new(
            SendState::Sending {
                user_message_id: message_id.clone(),
            },
        )
        .with_effect(Effect::append_user_message(message_id, text))
        .with_effect(Effect::RequestStream)),

        // Everything else holds (or just held) the slot
        (_, Event::UserMessage { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Stream lifecycle
        // ============================================================

        // Sending + StreamOpened -> Streaming
        (SendState::Sending { user_message_id }, Event::StreamOpened { message_id }) => {
            Ok(TransitionResult::new(SendState::Streaming {
                user_message_id: user_message_id.clone(),
                assistant_message_id: message_id.clone(),
                fragments: 0,
            })
            .with_effect(Effect::AppendPlaceholder { message_id }))
        }

        // Streaming + Fragment -> Streaming (empty fragments change nothing)
        (
            SendState::Streaming {
                user_message_id,
                assistant_message_id,
                fragments,
            },
            Event::Fragment { text },
        ) => {
            let next = SendState::Streaming {
                user_message_id: user_message_id.clone(),
                assistant_message_id: assistant_message_id.clone(),
                fragments: fragments.saturating_add(1),
            };
            if text.is_empty() {
                return Ok(TransitionResult::new(next));
            }
            Ok(TransitionResult::new(next).with_effect(Effect::AppendFragment {
                message_id: assistant_message_id.clone(),
                text,
            }))
        }

        // Streaming + StreamEnded -> Finalizing
        (
            SendState::Streaming {
                user_message_id,
                assistant_message_id,
                ..
            },
            Event::StreamEnded,
        ) => Ok(TransitionResult::new(SendState::Finalizing {
            user_message_id: user_message_id.clone(),
            assistant_message_id: assistant_message_id.clone(),
        })
        .with_effect(Effect::Finalize {
            message_id: assistant_message_id.clone(),
        })),

        // Finalizing + ReplyFinalized -> Finalized
        (
            SendState::Finalizing {
                user_message_id,
                assistant_message_id,
            },
            Event::ReplyFinalized,
        ) => Ok(TransitionResult::new(SendState::Finalized {
            user_message_id: user_message_id.clone(),
            assistant_message_id: assistant_message_id.clone(),
        })
        .with_effect(Effect::persist_exchange(
            user_message_id.clone(),
            assistant_message_id.clone(),
        ))
        .with_effect(Effect::ReleaseSlot)),

        // ============================================================
        // Failures
        // ============================================================

        // Failed before any placeholder existed: append a fresh apology
        (SendState::Sending { .. }, Event::StreamFailed { message }) => {
            Ok(TransitionResult::new(SendState::Failed { message })
                .with_effects([Effect::AppendApology, Effect::ReleaseSlot]))
        }

        // Failed mid-stream: the placeholder becomes the apology
        (
            SendState::Streaming {
                assistant_message_id,
                ..
            },
            Event::StreamFailed { message },
        ) => Ok(TransitionResult::new(SendState::Failed { message }).with_effects([
            Effect::ReplaceWithApology {
                message_id: assistant_message_id.clone(),
            },
            Effect::ReleaseSlot,
        ])),

        // ============================================================
        // Cancellation and deletion
        // ============================================================

        (SendState::Sending { .. }, Event::Cancel) => {
            Ok(TransitionResult::new(SendState::Idle).with_effect(Effect::ReleaseSlot))
        }

        (
            SendState::Streaming {
                assistant_message_id,
                ..
            },
            Event::Cancel,
        ) => Ok(TransitionResult::new(SendState::Idle).with_effects([
            Effect::DiscardPlaceholder {
                message_id: assistant_message_id.clone(),
            },
            Effect::ReleaseSlot,
        ])),

        // The chat is gone: nothing left to mutate
        (
            SendState::Sending { .. } | SendState::Streaming { .. } | SendState::Finalizing { .. },
            Event::ChatGone,
        ) => Ok(TransitionResult::new(SendState::Idle).with_effect(Effect::ReleaseSlot)),

        // ============================================================
        // Invalid
        // ============================================================

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} on {} for chat {}",
            state.name(),
            event.name(),
            context.chat_id
        ))),
    }
}
