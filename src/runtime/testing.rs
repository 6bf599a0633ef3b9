//! Mock implementations for testing
//!
//! These mocks enable integration testing of sends without real I/O.

use super::traits::*;
use crate::chat::{Chat, Message, Role};
use crate::llm::{FragmentStream, GenerationRequest, LlmError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

// ============================================================================
// Scripted Model Gateway
// ============================================================================

enum Script {
    Stream(FragmentStream),
    OpenError(LlmError),
    /// Opening stays pending until released, then fails
    Held(Arc<Notify>),
}

/// Model gateway that replays queued streams in order
pub struct ScriptedModelGateway {
    scripts: Mutex<VecDeque<Script>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<GenerationRequest>>,
    opened: Notify,
}

impl ScriptedModelGateway {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            opened: Notify::new(),
        }
    }

    /// Queue a stream that yields these fragments and then ends
    pub fn queue_fragments(&self, fragments: &[&str]) {
        let items: Vec<Result<String, LlmError>> =
            fragments.iter().map(|f| Ok((*f).to_string())).collect();
        self.queue_items(items);
    }

    /// Queue a stream that yields these items (errors included) and then ends
    pub fn queue_items(&self, items: Vec<Result<String, LlmError>>) {
        let stream: FragmentStream = Box::pin(futures::stream::iter(items));
        self.scripts.lock().unwrap().push_back(Script::Stream(stream));
    }

    /// Queue a failure to open
    pub fn queue_open_error(&self, error: LlmError) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::OpenError(error));
    }

    /// Queue an open that does not complete until the returned handle is notified
    pub fn queue_held_open(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Held(Arc::clone(&release)));
        release
    }

    /// Queue a stream fed by hand; it ends when the sender is dropped
    pub fn queue_channel(&self) -> mpsc::UnboundedSender<Result<String, LlmError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream: FragmentStream = Box::pin(UnboundedReceiverStream::new(rx));
        self.scripts.lock().unwrap().push_back(Script::Stream(stream));
        tx
    }

    /// Resolves once a stream has been handed out
    pub async fn wait_opened(&self) {
        self.opened.notified().await;
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for ScriptedModelGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelGateway for ScriptedModelGateway {
    async fn open_stream(&self, request: &GenerationRequest) -> Result<FragmentStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().pop_front();
        self.opened.notify_one();
        match script {
            Some(Script::Stream(stream)) => Ok(stream),
            Some(Script::OpenError(e)) => Err(e),
            Some(Script::Held(release)) => {
                release.notified().await;
                Err(LlmError::network("Held open was released"))
            }
            None => Err(LlmError::network("No scripted response queued")),
        }
    }
}

// ============================================================================
// Recording Persistence
// ============================================================================

/// One call observed by `RecordingPersistence`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistCall {
    CreateChat(String),
    RenameChat { chat_id: String, title: String },
    DeleteChat(String),
    AppendMessage {
        chat_id: String,
        message_id: String,
        role: Role,
    },
}

/// In-memory persistence that records every write
#[derive(Default)]
pub struct RecordingPersistence {
    chats: Mutex<HashMap<String, Chat>>,
    calls: Mutex<Vec<PersistCall>>,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate as if written by an earlier process
    pub fn with_chats(chats: Vec<Chat>) -> Self {
        let persistence = Self::new();
        persistence
            .chats
            .lock()
            .unwrap()
            .extend(chats.into_iter().map(|c| (c.id.clone(), c)));
        persistence
    }

    pub fn calls(&self) -> Vec<PersistCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn appended(&self) -> Vec<PersistCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PersistCall::AppendMessage { .. }))
            .collect()
    }

    pub fn stored_chat(&self, chat_id: &str) -> Option<Chat> {
        self.chats.lock().unwrap().get(chat_id).cloned()
    }

    fn record(&self, call: PersistCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PersistenceGateway for RecordingPersistence {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, PersistenceError> {
        self.record(PersistCall::CreateChat(chat.id.clone()));
        self.chats
            .lock()
            .unwrap()
            .insert(chat.id.clone(), chat.clone());
        Ok(chat.clone())
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Chat, PersistenceError> {
        self.stored_chat(chat_id)
            .ok_or_else(|| PersistenceError::NotFound(chat_id.to_string()))
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError> {
        let mut chats: Vec<Chat> = self.chats.lock().unwrap().values().cloned().collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<Chat, PersistenceError> {
        self.record(PersistCall::RenameChat {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
        });
        let mut chats = self.chats.lock().unwrap();
        let chat = chats
            .get_mut(chat_id)
            .ok_or_else(|| PersistenceError::NotFound(chat_id.to_string()))?;
        chat.title = title.to_string();
        Ok(chat.clone())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<bool, PersistenceError> {
        self.record(PersistCall::DeleteChat(chat_id.to_string()));
        Ok(self.chats.lock().unwrap().remove(chat_id).is_some())
    }

    async fn append_message(
        &self,
        chat_id: &str,
        message: &Message,
    ) -> Result<Message, PersistenceError> {
        self.record(PersistCall::AppendMessage {
            chat_id: chat_id.to_string(),
            message_id: message.id.clone(),
            role: message.role,
        });
        let mut chats = self.chats.lock().unwrap();
        let chat = chats
            .get_mut(chat_id)
            .ok_or_else(|| PersistenceError::NotFound(chat_id.to_string()))?;
        chat.messages.push(message.clone());
        Ok(message.clone())
    }
}

// ============================================================================
// Failing Persistence
// ============================================================================

/// Persistence whose every call fails
#[derive(Default)]
pub struct FailingPersistence;

#[async_trait]
impl PersistenceGateway for FailingPersistence {
    async fn create_chat(&self, _chat: &Chat) -> Result<Chat, PersistenceError> {
        Err(PersistenceError::Backend("disk full".to_string()))
    }

    async fn get_chat(&self, _chat_id: &str) -> Result<Chat, PersistenceError> {
        Err(PersistenceError::Backend("disk full".to_string()))
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError> {
        Err(PersistenceError::Backend("disk full".to_string()))
    }

    async fn rename_chat(&self, _chat_id: &str, _title: &str) -> Result<Chat, PersistenceError> {
        Err(PersistenceError::Backend("disk full".to_string()))
    }

    async fn delete_chat(&self, _chat_id: &str) -> Result<bool, PersistenceError> {
        Err(PersistenceError::Backend("disk full".to_string()))
    }

    async fn append_message(
        &self,
        _chat_id: &str,
        _message: &Message,
    ) -> Result<Message, PersistenceError> {
        Err(PersistenceError::Backend("disk full".to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{APOLOGY, GREETING};
    use crate::runtime::{ChatService, SendError};
    use crate::state_machine::SendState;
    use crate::store::ConversationStore;
    use chrono::Utc;
    use std::time::Duration;

    type TestService = ChatService<ScriptedModelGateway, RecordingPersistence>;

    fn service() -> (
        Arc<TestService>,
        Arc<ScriptedModelGateway>,
        Arc<RecordingPersistence>,
    ) {
        let model = Arc::new(ScriptedModelGateway::new());
        let persistence = Arc::new(RecordingPersistence::new());
        let service = ChatService::new(
            Arc::new(ConversationStore::new()),
            Arc::clone(&model),
            Arc::clone(&persistence),
        );
        (Arc::new(service), model, persistence)
    }

    fn texts(chat: &Chat) -> Vec<String> {
        chat.messages.iter().map(|m| m.text().to_string()).collect()
    }

    async fn wait_until_idle(service: &TestService, chat_id: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while service.is_sending(chat_id) {
            assert!(tokio::time::Instant::now() < deadline, "send never finished");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until the chat's streaming message shows `text`
    async fn wait_for_partial(service: &TestService, chat_id: &str, text: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let chat = service.get_chat(chat_id).unwrap();
            if chat.streaming_message().is_some_and(|m| m.text() == text) {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "fragment never applied");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_streamed_reply_is_finalized_and_persisted() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(Some("Greeting"));
        model.queue_fragments(&["Hello ", "world"]);

        let outcome = service.send_message(&chat.id, "Say hi").await.unwrap();
        assert_eq!(outcome.final_assistant_text, "Hello world");
        assert!(!outcome.failed);
        assert_eq!(outcome.extracted_code, None);

        let stored = service.get_chat(&chat.id).unwrap();
        assert_eq!(texts(&stored), vec![GREETING, "Say hi", "Hello world"]);
        assert!(stored.messages.iter().all(|m| !m.is_streaming()));
        assert_eq!(stored.messages[2].id, outcome.assistant_message_id);
        assert!(service.send_state(&chat.id).is_idle());

        service.flush().await;
        assert_eq!(
            persistence.appended(),
            vec![
                PersistCall::AppendMessage {
                    chat_id: chat.id.clone(),
                    message_id: outcome.user_message_id.clone(),
                    role: Role::User,
                },
                PersistCall::AppendMessage {
                    chat_id: chat.id.clone(),
                    message_id: outcome.assistant_message_id.clone(),
                    role: Role::Assistant,
                },
            ]
        );
        assert_eq!(persistence.stored_chat(&chat.id).unwrap().messages.len(), 3);
    }

    #[tokio::test]
    async fn test_request_carries_full_history() {
        let (service, model, _) = service();
        let chat = service.create_chat(None);
        model.queue_fragments(&["ok"]);

        service.send_message(&chat.id, "first").await.unwrap();

        let requests = model.recorded_requests();
        assert_eq!(requests.len(), 1);
        let roles: Vec<Role> = requests[0].messages.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User]);
        assert_eq!(requests[0].last_user_text(), Some("first"));
        assert_eq!(requests[0].conversation_id.as_deref(), Some(chat.id.as_str()));
    }

    #[tokio::test]
    async fn test_code_split_across_fragments_is_extracted() {
        let (service, model, _) = service();
        let chat = service.create_chat(None);
        model.queue_fragments(&["Here:\n```py\nprint(", "1)\n", "```\nDone"]);

        let outcome = service.send_message(&chat.id, "print one").await.unwrap();
        assert_eq!(
            outcome.extracted_code.as_deref(),
            Some("```py\nprint(1)\n```")
        );
        assert_eq!(outcome.code_blocks.len(), 1);
        assert_eq!(outcome.code_blocks[0].language.as_deref(), Some("py"));
    }

    #[tokio::test]
    async fn test_open_failure_shows_single_apology() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(None);
        model.queue_open_error(LlmError::server_error("upstream 502"));

        let outcome = service.send_message(&chat.id, "hello").await.unwrap();
        assert!(outcome.failed);
        assert_eq!(outcome.final_assistant_text, APOLOGY);
        assert_eq!(outcome.extracted_code, None);

        let stored = service.get_chat(&chat.id).unwrap();
        assert_eq!(texts(&stored), vec![GREETING, "hello", APOLOGY]);
        assert!(service.send_state(&chat.id).is_idle());

        service.flush().await;
        assert!(persistence.appended().is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_replaces_partial_reply() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(None);
        model.queue_items(vec![
            Ok("partial ```rust\nfn".to_string()),
            Err(LlmError::network("connection reset")),
        ]);

        let outcome = service.send_message(&chat.id, "write fn").await.unwrap();
        assert!(outcome.failed);
        assert!(outcome.code_blocks.is_empty());

        let stored = service.get_chat(&chat.id).unwrap();
        assert_eq!(texts(&stored), vec![GREETING, "write fn", APOLOGY]);
        assert!(stored.streaming_message().is_none());

        service.flush().await;
        assert!(persistence.appended().is_empty());
    }

    #[tokio::test]
    async fn test_chat_usable_after_failure() {
        let (service, model, _) = service();
        let chat = service.create_chat(None);
        model.queue_open_error(LlmError::rate_limit("slow down"));
        model.queue_fragments(&["second try"]);

        assert!(service.send_message(&chat.id, "one").await.unwrap().failed);
        let outcome = service.send_message(&chat.id, "two").await.unwrap();
        assert_eq!(outcome.final_assistant_text, "second try");
    }

    #[tokio::test]
    async fn test_second_send_rejected_while_busy() {
        let (service, model, _) = service();
        let chat = service.create_chat(None);
        let tx = model.queue_channel();

        let first = {
            let service = Arc::clone(&service);
            let chat_id = chat.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "first").await })
        };
        model.wait_opened().await;
        tx.send(Ok("partial".to_string())).unwrap();
        wait_for_partial(&service, &chat.id, "partial").await;
        assert!(service.is_sending(&chat.id));
        assert!(matches!(
            service.send_state(&chat.id),
            SendState::Streaming { fragments: 1, .. }
        ));

        let before = service.get_chat(&chat.id).unwrap().messages.len();
        let second = service.send_message(&chat.id, "second").await;
        assert_eq!(second, Err(SendError::Busy(chat.id.clone())));
        assert_eq!(service.get_chat(&chat.id).unwrap().messages.len(), before);
        assert_eq!(model.recorded_requests().len(), 1);

        drop(tx);
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.final_assistant_text, "partial");
        assert!(!service.is_sending(&chat.id));
    }

    #[tokio::test]
    async fn test_other_chats_send_concurrently() {
        let (service, model, _) = service();
        let busy = service.create_chat(Some("busy"));
        let free = service.create_chat(Some("free"));
        let tx = model.queue_channel();

        let first = {
            let service = Arc::clone(&service);
            let chat_id = busy.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "slow").await })
        };
        model.wait_opened().await;

        model.queue_fragments(&["fast"]);
        let outcome = service.send_message(&free.id, "quick").await.unwrap();
        assert_eq!(outcome.final_assistant_text, "fast");
        assert!(service.is_sending(&busy.id));

        drop(tx);
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_stream_without_persisting() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(None);
        let tx = model.queue_channel();

        let send = {
            let service = Arc::clone(&service);
            let chat_id = chat.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "long answer").await })
        };
        model.wait_opened().await;
        tx.send(Ok("Once upon".to_string())).unwrap();

        assert!(service.cancel(&chat.id));
        assert_eq!(send.await.unwrap(), Err(SendError::Cancelled));
        assert!(!service.is_sending(&chat.id));
        assert!(!service.cancel(&chat.id));

        let stored = service.get_chat(&chat.id).unwrap();
        assert_eq!(texts(&stored), vec![GREETING, "long answer"]);

        // Late fragments go nowhere
        let _ = tx.send(Ok(" a time".to_string()));
        service.flush().await;
        assert!(persistence.appended().is_empty());
    }

    #[tokio::test]
    async fn test_delete_during_stream_discards_fragments() {
        let (service, model, persistence) = service();
        let doomed = service.create_chat(Some("doomed"));
        let bystander = service.create_chat(Some("bystander"));
        let tx = model.queue_channel();

        let send = {
            let service = Arc::clone(&service);
            let chat_id = doomed.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "hi").await })
        };
        model.wait_opened().await;
        tx.send(Ok("Hel".to_string())).unwrap();

        service.delete_chat(&doomed.id).unwrap();
        let _ = tx.send(Ok("lo".to_string()));

        assert_eq!(
            send.await.unwrap(),
            Err(SendError::ChatNotFound(doomed.id.clone()))
        );
        wait_until_idle(&service, &doomed.id).await;
        assert!(service.get_chat(&doomed.id).is_err());
        assert_eq!(texts(&service.get_chat(&bystander.id).unwrap()), vec![GREETING]);

        service.flush().await;
        assert!(persistence.appended().is_empty());
        assert!(persistence
            .calls()
            .contains(&PersistCall::DeleteChat(doomed.id.clone())));
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_strand_partial_reply() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(None);
        let tx = model.queue_channel();

        let caller = {
            let service = Arc::clone(&service);
            let chat_id = chat.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "hello").await })
        };
        model.wait_opened().await;
        tx.send(Ok("partial garb".to_string())).unwrap();
        wait_for_partial(&service, &chat.id, "partial garb").await;

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        // The reply keeps streaming without anyone waiting on it
        assert!(service.is_sending(&chat.id));
        tx.send(Ok("age".to_string())).unwrap();
        drop(tx);
        wait_until_idle(&service, &chat.id).await;

        let stored = service.get_chat(&chat.id).unwrap();
        assert!(stored.streaming_message().is_none());
        assert_eq!(texts(&stored), vec![GREETING, "hello", "partial garbage"]);
        service.flush().await;
        assert_eq!(persistence.appended().len(), 2);

        model.queue_fragments(&["again"]);
        let outcome = service.send_message(&chat.id, "retry").await.unwrap();
        assert_eq!(outcome.final_assistant_text, "again");
        let stored = service.get_chat(&chat.id).unwrap();
        assert!(stored.streaming_message().is_none());
        assert_eq!(stored.messages.len(), 5);
    }

    #[tokio::test]
    async fn test_cancel_while_stream_is_opening() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(None);
        let _release = model.queue_held_open();

        let send = {
            let service = Arc::clone(&service);
            let chat_id = chat.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "hello").await })
        };
        model.wait_opened().await;
        assert!(matches!(
            service.send_state(&chat.id),
            SendState::Sending { .. }
        ));

        assert!(service.cancel(&chat.id));
        assert_eq!(send.await.unwrap(), Err(SendError::Cancelled));
        assert!(!service.is_sending(&chat.id));
        assert_eq!(texts(&service.get_chat(&chat.id).unwrap()), vec![GREETING, "hello"]);

        service.flush().await;
        assert!(persistence.appended().is_empty());
    }

    #[tokio::test]
    async fn test_delete_while_stream_is_opening() {
        let (service, model, persistence) = service();
        let chat = service.create_chat(None);
        let _release = model.queue_held_open();

        let send = {
            let service = Arc::clone(&service);
            let chat_id = chat.id.clone();
            tokio::spawn(async move { service.send_message(&chat_id, "hello").await })
        };
        model.wait_opened().await;

        service.delete_chat(&chat.id).unwrap();
        assert_eq!(
            send.await.unwrap(),
            Err(SendError::ChatNotFound(chat.id.clone()))
        );
        assert!(!service.is_sending(&chat.id));
        assert!(service.get_chat(&chat.id).is_err());
        assert!(service.list_chats().is_empty());

        service.flush().await;
        assert!(persistence.appended().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_sends_touch_nothing() {
        let (service, model, _) = service();
        let chat = service.create_chat(None);

        assert_eq!(
            service.send_message(&chat.id, "   ").await,
            Err(SendError::InvalidInput)
        );
        assert_eq!(
            service.send_message("missing", "hello").await,
            Err(SendError::ChatNotFound("missing".to_string()))
        );
        assert!(model.recorded_requests().is_empty());
        assert_eq!(service.get_chat(&chat.id).unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failures_do_not_block_sends() {
        let model = Arc::new(ScriptedModelGateway::new());
        let service = ChatService::new(
            Arc::new(ConversationStore::new()),
            Arc::clone(&model),
            Arc::new(FailingPersistence),
        );
        let chat = service.create_chat(None);
        model.queue_fragments(&["still works"]);

        let outcome = service.send_message(&chat.id, "hi").await.unwrap();
        assert_eq!(outcome.final_assistant_text, "still works");
        service.flush().await;
        assert!(service.load().await.is_err());
        assert!(service.get_chat(&chat.id).is_ok());
    }

    #[tokio::test]
    async fn test_lifecycle_writes_reach_persistence_in_order() {
        let (service, _, persistence) = service();
        let chat = service.create_chat(Some("draft"));
        service.rename_chat(&chat.id, "  final  ").unwrap();
        service.delete_chat(&chat.id).unwrap();
        service.flush().await;

        assert_eq!(
            persistence.calls(),
            vec![
                PersistCall::CreateChat(chat.id.clone()),
                PersistCall::RenameChat {
                    chat_id: chat.id.clone(),
                    title: "final".to_string(),
                },
                PersistCall::DeleteChat(chat.id.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_rename_falls_back_to_default_title() {
        let (service, _, persistence) = service();
        let chat = service.create_chat(Some("draft"));

        let renamed = service.rename_chat(&chat.id, "  ").unwrap();
        assert!(renamed.title.starts_with("Chat "));
        service.flush().await;
        assert!(persistence.calls().contains(&PersistCall::RenameChat {
            chat_id: chat.id.clone(),
            title: renamed.title.clone(),
        }));
    }

    #[tokio::test]
    async fn test_load_hydrates_store() {
        let mut saved = Chat::seeded(Some("saved"), Utc::now());
        saved.messages[0].content.streaming = true;
        let persistence = Arc::new(RecordingPersistence::with_chats(vec![saved.clone()]));
        let service = ChatService::new(
            Arc::new(ConversationStore::new()),
            Arc::new(ScriptedModelGateway::new()),
            persistence,
        );

        assert_eq!(service.load().await.unwrap(), 1);
        let listed = service.list_chats();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "saved");
        assert!(service.get_chat(&saved.id).unwrap().streaming_message().is_none());
        assert!(service.current_chat().is_none());
    }
}
