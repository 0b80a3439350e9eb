//! DI "Interfaces"

use crate::core::error::{RelayError, ServiceError};
use crate::core::relay::{ChatMessage, TextStream};
use crate::infrastructure::entities;
use async_trait::async_trait;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Lists conversations, most recently updated first.
    ///
    /// Returns `Err` if `skip` is negative or `limit` is outside `1..=MAX_PAGE_SIZE`.
    async fn list_conversations(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<entities::Conversation>, ServiceError>;

    /// Creates a new, empty conversation.
    async fn create_conversation(
        &self,
        title: Option<String>,
    ) -> Result<entities::Conversation, ServiceError>;

    /// Fetches a conversation together with its messages in chronological order.
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<(entities::Conversation, Vec<entities::Message>), ServiceError>;

    /// Replaces the title (when given) and bumps `updated_at`.
    async fn update_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
    ) -> Result<entities::Conversation, ServiceError>;

    /// Deletes a conversation and all of its messages.
    ///
    /// Returns `Err` if the conversation did not exist.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ServiceError>;

    /// List all messages in a conversation.
    async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<entities::Message>, ServiceError>;

    /// Appends an ordered batch of messages, atomically.
    ///
    /// Returns `Err` if the conversation does not exist, in which case nothing is stored.
    async fn append_messages(
        &self,
        conversation_id: &str,
        messages: Vec<entities::MessageDraft>,
    ) -> Result<Vec<entities::Message>, ServiceError>;
}

/// A hosted model that streams its reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Opens a streaming completion for `messages`, system prompt included.
    ///
    /// Errors that happen before any text is produced are returned directly, later ones are
    /// yielded by the stream.
    async fn stream_completion(&self, messages: Vec<ChatMessage>)
    -> Result<TextStream, RelayError>;
}
