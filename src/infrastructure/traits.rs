//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Most recently updated first.
    async fn list_conversations(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<entities::Conversation>, sqlx::Error>;

    async fn find_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<entities::Conversation>, sqlx::Error>;

    async fn create_conversation(
        &self,
        conversation: entities::Conversation,
    ) -> Result<entities::Conversation, sqlx::Error>;

    /// Sets `title` when given and moves `updated_at` forward to `now`, in one statement.
    /// Returns `None` if the conversation does not exist.
    async fn update_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<entities::Conversation>, sqlx::Error>;

    /// Returns `false` if there was nothing to delete.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool, sqlx::Error>;

    async fn list_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<entities::Message>, sqlx::Error>;

    /// Stores the batch and the conversation bookkeeping in one transaction.
    ///
    /// Returns `None`, having written nothing, if the conversation does not exist.
    async fn append_messages(
        &self,
        conversation_id: &str,
        messages: Vec<entities::MessageDraft>,
        now: DateTime<Utc>,
    ) -> Result<Option<(entities::Conversation, Vec<entities::Message>)>, sqlx::Error>;
}
