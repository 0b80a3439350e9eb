//! Implementations for the service the app needs.
//!

use crate::core::error::ServiceError;
use crate::core::traits::{ConversationService, MAX_PAGE_SIZE};
use crate::infrastructure::entities::{Conversation, Message, MessageDraft};
use crate::infrastructure::traits::ConversationRepository;
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::{debug, info};

pub const MAX_TITLE_CHARS: usize = 100;

#[injectable(ConversationService)]
pub struct MyConversationService {
    repo: Ref<dyn ConversationRepository>,
}

#[async_trait]
impl ConversationService for MyConversationService {
    async fn list_conversations(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Conversation>, ServiceError> {
        if skip < 0 {
            return Err(ServiceError::Validation("skip must not be negative".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ServiceError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(self.repo.list_conversations(skip, limit).await?)
    }

    async fn create_conversation(
        &self,
        title: Option<String>,
    ) -> Result<Conversation, ServiceError> {
        if let Some(title) = &title {
            validate_title(title)?;
        }

        let conversation = self
            .repo
            .create_conversation(Conversation::new(title, Utc::now()))
            .await?;

        info!("created conversation {}", conversation.id);
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<(Conversation, Vec<Message>), ServiceError> {
        let conversation = self.find(conversation_id).await?;
        let messages = self.repo.list_conversation_messages(conversation_id).await?;

        Ok((conversation, messages))
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
    ) -> Result<Conversation, ServiceError> {
        if let Some(title) = &title {
            validate_title(title)?;
        }

        self.repo
            .update_conversation(conversation_id, title, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(conversation_id.to_owned()))
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ServiceError> {
        if self.repo.delete_conversation(conversation_id).await? {
            info!("deleted conversation {conversation_id}");
            Ok(())
        } else {
            Err(ServiceError::NotFound(conversation_id.to_owned()))
        }
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ServiceError> {
        self.find(conversation_id).await?;

        Ok(self.repo.list_conversation_messages(conversation_id).await?)
    }

    async fn append_messages(
        &self,
        conversation_id: &str,
        messages: Vec<MessageDraft>,
    ) -> Result<Vec<Message>, ServiceError> {
        if messages.is_empty() {
            return Err(ServiceError::Validation(
                "at least one message is required".into(),
            ));
        }
        if messages.iter().any(|m| m.content.is_empty()) {
            return Err(ServiceError::Validation(
                "message content must not be empty".into(),
            ));
        }

        let (conversation, stored) = self
            .repo
            .append_messages(conversation_id, messages, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(conversation_id.to_owned()))?;

        debug!(
            "appended {} messages to conversation {}",
            stored.len(),
            conversation.id
        );
        Ok(stored)
    }
}

impl MyConversationService {
    async fn find(&self, conversation_id: &str) -> Result<Conversation, ServiceError> {
        self.repo
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(conversation_id.to_owned()))
    }
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ServiceError::Validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}
