//! View-model for a chat UI.

use crate::api::conversations::schemas::{Conversation, ConversationWithMessages, NewMessage};
use crate::client::ClientError;
use crate::infrastructure::entities::MessageRole;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user (toast, status line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Everything a chat UI renders.
///
/// While `loading` is set, the last transcript entry is the assistant reply being streamed.
#[derive(Debug)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    current: Option<String>,
    transcript: Vec<TranscriptEntry>,
    loading: bool,
    history_available: bool,
    notices: Vec<Notice>,
}

impl Default for ChatState {
    fn default() -> Self {
        ChatState {
            conversations: Vec::new(),
            current: None,
            transcript: Vec::new(),
            loading: false,
            history_available: true,
            notices: Vec::new(),
        }
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// `false` once the history API turned out to be unreachable: chat works, nothing is saved.
    pub fn history_available(&self) -> bool {
        self.history_available
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn set_history_available(&mut self, available: bool) {
        if self.history_available && !available {
            self.notify(
                NoticeLevel::Warning,
                "Conversation history is unavailable. Chat still works, but it will not be saved.",
            );
        }
        self.history_available = available;
    }

    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Puts `conversation` at the top of the list, replacing an older copy.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }

    /// "New chat": nothing is created on the server until the first message.
    pub fn start_new_conversation(&mut self) {
        self.current = None;
        self.transcript.clear();
    }

    /// Makes a freshly created conversation current, keeping the transcript.
    pub fn adopt_conversation(&mut self, conversation: Conversation) {
        self.current = Some(conversation.id.clone());
        self.upsert_conversation(conversation);
    }

    pub fn select_conversation(&mut self, conversation: ConversationWithMessages) {
        self.current = Some(conversation.id.clone());
        self.transcript = conversation
            .messages
            .iter()
            .map(|m| TranscriptEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        let summary = conversation.summary();
        if let Some(existing) = self.conversations.iter_mut().find(|c| c.id == summary.id) {
            *existing = summary;
        } else {
            self.conversations.insert(0, summary);
        }
    }

    pub fn remove_conversation(&mut self, conversation_id: &str) {
        self.conversations.retain(|c| c.id != conversation_id);
        if self.current.as_deref() == Some(conversation_id) {
            self.start_new_conversation();
        }
    }

    /// Adds the user message and an empty assistant entry.
    ///
    /// Returns the history to send to the relay, which ends with the new user message.
    pub fn begin_turn(&mut self, text: &str) -> Result<Vec<NewMessage>, ClientError> {
        if self.loading {
            return Err(ClientError::Rejected(
                "a reply is still being streamed".into(),
            ));
        }
        if text.trim().is_empty() {
            return Err(ClientError::Rejected("message is empty".into()));
        }

        self.transcript.push(TranscriptEntry {
            role: MessageRole::User,
            content: text.to_owned(),
        });
        let history = self
            .transcript
            .iter()
            .map(|entry| NewMessage {
                role: entry.role,
                content: entry.content.clone(),
            })
            .collect();

        self.transcript.push(TranscriptEntry {
            role: MessageRole::Assistant,
            content: String::new(),
        });
        self.loading = true;

        Ok(history)
    }

    pub fn append_chunk(&mut self, chunk: &str) {
        if !self.loading {
            return;
        }
        if let Some(reply) = self.transcript.last_mut() {
            reply.content.push_str(chunk);
        }
    }

    /// Closes the turn. Returns the user/assistant pair to persist.
    pub fn finish_turn(&mut self) -> Option<Vec<NewMessage>> {
        if !self.loading {
            return None;
        }
        self.loading = false;

        let [question, answer] = self.transcript.last_chunk::<2>()?;
        Some(vec![
            NewMessage {
                role: question.role,
                content: question.content.clone(),
            },
            NewMessage {
                role: answer.role,
                content: answer.content.clone(),
            },
        ])
    }

    /// Drops the partial assistant entry; the user message stays visible.
    pub fn abort_turn(&mut self, reason: &ClientError) {
        if !self.loading {
            return;
        }
        self.loading = false;
        if self
            .transcript
            .last()
            .is_some_and(|entry| entry.role == MessageRole::Assistant)
        {
            self.transcript.pop();
        }
        self.notify(
            NoticeLevel::Error,
            format!("The assistant could not answer: {reason}"),
        );
    }
}
