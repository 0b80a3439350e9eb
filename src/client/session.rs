//! Drives `ChatState` through conversations and turns.

use crate::api::conversations::schemas::NewMessage;
use crate::client::ClientError;
use crate::client::state::{ChatState, NoticeLevel};
use crate::client::transport::{ChatRelay, HistoryStore};
use futures_util::StreamExt;
use log::{debug, warn};

/// One user at one chat window.
///
/// Owns the state; every change is followed by a call to the `render` callback the caller
/// passes in.
pub struct ChatSession<R, H> {
    relay: R,
    history: H,
    state: ChatState,
}

impl<R: ChatRelay, H: HistoryStore> ChatSession<R, H> {
    pub fn new(relay: R, history: H) -> Self {
        ChatSession {
            relay,
            history,
            state: ChatState::new(),
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    /// Reloads the conversation list.
    pub async fn refresh(&mut self) {
        match self.history.list().await {
            Ok(conversations) => {
                self.state.set_history_available(true);
                self.state.set_conversations(conversations);
            }
            Err(e) => self.history_failed("Could not load conversations", e),
        }
    }

    pub fn new_chat(&mut self) {
        self.state.start_new_conversation();
    }

    pub async fn open(&mut self, conversation_id: &str) -> Result<(), ClientError> {
        match self.history.get(conversation_id).await {
            Ok(conversation) => {
                self.state.select_conversation(conversation);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.history_failed("Could not open conversation", e);
                Err(ClientError::Rejected(message))
            }
        }
    }

    pub async fn rename(&mut self, conversation_id: &str, title: &str) -> Result<(), ClientError> {
        match self.history.rename(conversation_id, title.to_owned()).await {
            Ok(conversation) => {
                self.state.upsert_conversation(conversation);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.history_failed("Could not rename conversation", e);
                Err(ClientError::Rejected(message))
            }
        }
    }

    pub async fn delete(&mut self, conversation_id: &str) -> Result<(), ClientError> {
        match self.history.delete(conversation_id).await {
            Ok(()) => {
                self.state.remove_conversation(conversation_id);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.history_failed("Could not delete conversation", e);
                Err(ClientError::Rejected(message))
            }
        }
    }

    /// Sends `text`, streams the reply into the state and persists the finished turn.
    ///
    /// A reply that fails part-way is removed from the transcript and not saved. History
    /// failures never fail the turn, they only leave a notice.
    pub async fn send(
        &mut self,
        text: &str,
        render: &mut (dyn FnMut(&ChatState) + Send),
    ) -> Result<(), ClientError> {
        if self.state.is_loading() {
            return Err(ClientError::Rejected(
                "a reply is still being streamed".into(),
            ));
        }

        let history = self.state.begin_turn(text)?;
        render(&self.state);

        let mut chunks = match self.relay.open(history).await {
            Ok(chunks) => chunks,
            Err(e) => {
                self.state.abort_turn(&e);
                render(&self.state);
                return Err(e);
            }
        };

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    self.state.append_chunk(&chunk);
                    render(&self.state);
                }
                Err(e) => {
                    self.state.abort_turn(&e);
                    render(&self.state);
                    return Err(e);
                }
            }
        }

        if let Some(exchange) = self.state.finish_turn() {
            render(&self.state);
            self.persist(exchange).await;
            render(&self.state);
        }

        Ok(())
    }

    /// A new chat gets its conversation on the server with its first completed turn, so a
    /// failed first turn leaves nothing behind.
    async fn ensure_conversation(&mut self) -> Option<String> {
        if let Some(id) = self.state.current() {
            return Some(id.to_owned());
        }

        match self.history.create(None).await {
            Ok(conversation) => {
                self.state.set_history_available(true);
                let id = conversation.id.clone();
                self.state.adopt_conversation(conversation);
                Some(id)
            }
            Err(e) => {
                self.history_failed("Could not start a saved conversation", e);
                None
            }
        }
    }

    async fn persist(&mut self, exchange: Vec<NewMessage>) {
        let Some(conversation_id) = self.ensure_conversation().await else {
            debug!("no saved conversation, reply kept locally only");
            return;
        };

        if let Err(e) = self.history.append(&conversation_id, exchange).await {
            self.history_failed("The reply was not saved", e);
            return;
        }

        // pick up the generated title and new ordering
        if let Ok(conversation) = self.history.get(&conversation_id).await {
            self.state.upsert_conversation(conversation.summary());
        }
    }

    fn history_failed(&mut self, context: &str, error: ClientError) {
        warn!("{context}: {error}");
        if error.is_unavailable() {
            self.state.set_history_available(false);
        } else {
            self.state
                .notify(NoticeLevel::Warning, format!("{context}: {error}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::conversations::schemas::{Conversation, ConversationWithMessages, Message};
    use crate::client::transport::ChunkStream;
    use crate::infrastructure::entities::MessageRole;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures_util::stream;
    use std::sync::{Arc, Mutex};

    struct ScriptedRelay {
        chunks: Vec<&'static str>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl ChatRelay for ScriptedRelay {
        async fn open(&self, _messages: Vec<NewMessage>) -> Result<ChunkStream, ClientError> {
            let mut items: Vec<Result<String, ClientError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            if let Some(at) = self.fail_after {
                items.truncate(at);
                items.push(Err(ClientError::Interrupted("connection reset".into())));
            }
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[derive(Default, Clone)]
    struct RecordingHistory {
        appended: Arc<Mutex<Vec<(String, Vec<NewMessage>)>>>,
        created: Arc<Mutex<usize>>,
        offline: bool,
    }

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.to_owned(),
            title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl HistoryStore for RecordingHistory {
        async fn list(&self) -> Result<Vec<Conversation>, ClientError> {
            if self.offline {
                return Err(ClientError::Unavailable("connection refused".into()));
            }
            Ok(Vec::new())
        }

        async fn create(&self, _title: Option<String>) -> Result<Conversation, ClientError> {
            if self.offline {
                return Err(ClientError::Unavailable("connection refused".into()));
            }
            *self.created.lock().unwrap() += 1;
            Ok(conversation("c1"))
        }

        async fn get(&self, id: &str) -> Result<ConversationWithMessages, ClientError> {
            Ok(ConversationWithMessages {
                id: id.to_owned(),
                title: Some("Hello".into()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                messages: Vec::<Message>::new(),
            })
        }

        async fn rename(&self, id: &str, _title: String) -> Result<Conversation, ClientError> {
            Ok(conversation(id))
        }

        async fn delete(&self, _id: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn append(
            &self,
            id: &str,
            messages: Vec<NewMessage>,
        ) -> Result<Vec<Message>, ClientError> {
            self.appended
                .lock()
                .unwrap()
                .push((id.to_owned(), messages));
            Ok(Vec::new())
        }
    }

    fn session(
        relay: ScriptedRelay,
        history: RecordingHistory,
    ) -> ChatSession<ScriptedRelay, RecordingHistory> {
        ChatSession::new(relay, history)
    }

    #[tokio::test]
    async fn test_completed_reply_is_persisted_once() {
        let history = RecordingHistory::default();
        let mut session = session(
            ScriptedRelay {
                chunks: vec!["Hi ", "there"],
                fail_after: None,
            },
            history.clone(),
        );
        let mut renders = Vec::new();

        session
            .send("Hello", &mut |state: &ChatState| {
                renders.push(state.transcript().last().unwrap().content.clone())
            })
            .await
            .unwrap();

        assert!(renders.contains(&"Hi ".to_owned()));
        assert_eq!(session.state().transcript()[1].content, "Hi there");

        let appended = history.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        let (id, pair) = &appended[0];
        assert_eq!(id, "c1");
        assert_eq!(
            pair,
            &vec![
                NewMessage {
                    role: MessageRole::User,
                    content: "Hello".into()
                },
                NewMessage {
                    role: MessageRole::Assistant,
                    content: "Hi there".into()
                },
            ]
        );
        assert_eq!(
            session.state().conversations()[0].title.as_deref(),
            Some("Hello")
        );
    }

    #[tokio::test]
    async fn test_interrupted_reply_is_discarded() {
        let history = RecordingHistory::default();
        let mut session = session(
            ScriptedRelay {
                chunks: vec!["Hi ", "there"],
                fail_after: Some(1),
            },
            history.clone(),
        );

        let result = session.send("Hello", &mut |_: &ChatState| {}).await;

        assert!(matches!(result, Err(ClientError::Interrupted(_))));
        assert!(history.appended.lock().unwrap().is_empty());
        let transcript = session.state().transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, MessageRole::User);
        assert!(!session.state().is_loading());
    }

    #[tokio::test]
    async fn test_failed_first_turn_creates_no_conversation() {
        let history = RecordingHistory::default();
        let mut session = session(
            ScriptedRelay {
                chunks: vec!["Hi "],
                fail_after: Some(0),
            },
            history.clone(),
        );

        let result = session.send("Hello", &mut |_: &ChatState| {}).await;

        assert!(result.is_err());
        assert_eq!(*history.created.lock().unwrap(), 0);
        assert!(session.state().current().is_none());
        assert!(session.state().conversations().is_empty());
    }

    #[tokio::test]
    async fn test_chat_continues_without_history() {
        let history = RecordingHistory {
            offline: true,
            ..Default::default()
        };
        let mut session = session(
            ScriptedRelay {
                chunks: vec!["Works anyway"],
                fail_after: None,
            },
            history.clone(),
        );

        session.send("Hello", &mut |_: &ChatState| {}).await.unwrap();

        assert!(!session.state().history_available());
        assert_eq!(session.state().transcript()[1].content, "Works anyway");
        assert!(history.appended.lock().unwrap().is_empty());
        assert_eq!(
            session.state_mut().take_notices()[0].level,
            NoticeLevel::Warning
        );
    }

    #[tokio::test]
    async fn test_second_turn_reuses_conversation() {
        let history = RecordingHistory::default();
        let mut session = session(
            ScriptedRelay {
                chunks: vec!["ok"],
                fail_after: None,
            },
            history.clone(),
        );

        session.send("one", &mut |_: &ChatState| {}).await.unwrap();
        session.send("two", &mut |_: &ChatState| {}).await.unwrap();

        assert_eq!(*history.created.lock().unwrap(), 1);
        let appended = history.appended.lock().unwrap();
        assert_eq!(appended.len(), 2);
        assert_eq!(appended[1].1[0].content, "two");
        assert_eq!(session.state().transcript().len(), 4);
    }
}
