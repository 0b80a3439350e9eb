//! Database entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Auto-generated titles keep this many characters of the first user message.
pub const GENERATED_TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, FromRow)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: Option<String>, now: DateTime<Utc>) -> Self {
        Conversation {
            id: Uuid::new_v4().to_string(),
            title,
            created_at: now,
            updated_at: now,
        }
    }

    /// Title an untitled conversation takes from a batch of appended messages: the first
    /// user message, shortened. `None` when the conversation keeps its current title.
    pub fn generated_title(&self, messages: &[MessageDraft]) -> Option<String> {
        if self.title.as_deref().is_some_and(|title| !title.is_empty()) {
            return None;
        }

        messages
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|first| title_from(&first.content))
    }
}

fn title_from(content: &str) -> String {
    let mut chars = content.chars();
    let mut title: String = chars.by_ref().take(GENERATED_TITLE_CHARS).collect();
    if chars.next().is_some() {
        title.push_str("...");
    }
    title
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message that has not been stored yet.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub role: MessageRole,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(role: MessageRole, content: &str) -> MessageDraft {
        MessageDraft {
            role,
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_title_generated_from_first_user_message() {
        let conversation = Conversation::new(None, Utc::now());

        let title = conversation.generated_title(&[
            draft(MessageRole::Assistant, "ignored"),
            draft(MessageRole::User, "How do I migrate to GCP?"),
        ]);

        assert_eq!(title.as_deref(), Some("How do I migrate to GCP?"));
    }

    #[test]
    fn test_generated_title_is_truncated() {
        let conversation = Conversation::new(None, Utc::now());
        let long = "é".repeat(60);

        let title = conversation
            .generated_title(&[draft(MessageRole::User, &long)])
            .unwrap();

        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), GENERATED_TITLE_CHARS + 3);
    }

    #[test]
    fn test_existing_title_is_kept() {
        let conversation = Conversation::new(Some("Storage".into()), Utc::now());

        assert!(conversation
            .generated_title(&[draft(MessageRole::User, "Hello")])
            .is_none());
    }

    #[test]
    fn test_empty_title_counts_as_untitled() {
        let conversation = Conversation::new(Some(String::new()), Utc::now());

        let title = conversation.generated_title(&[draft(MessageRole::User, "Hello")]);

        assert_eq!(title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_batch_without_user_message_leaves_title() {
        let conversation = Conversation::new(None, Utc::now());

        assert!(conversation
            .generated_title(&[draft(MessageRole::Assistant, "Hi")])
            .is_none());
    }
}
