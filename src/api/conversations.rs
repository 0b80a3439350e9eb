//! Conversations endpoints

use crate::api::conversations::schemas::{
    Conversation, ConversationWithMessages, CreateConversation, ListParams, Message, NewMessage,
    UpdateConversation,
};
use crate::api::error::ApiError;
use crate::api::{JsonBody, QueryParams};
use crate::core::traits::{ConversationService, DEFAULT_PAGE_SIZE};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_conversations).post(create_conversation))
        .route(
            "/:id",
            get(get_conversation)
                .patch(update_conversation)
                .delete(delete_conversation),
        )
        .route("/:id/messages", get(list_messages).post(append_messages))
}

async fn list_conversations(
    Inject(conversation_service): Inject<dyn ConversationService>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conversations = conversation_service
        .list_conversations(
            params.skip.unwrap_or(0),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(
        conversations.into_iter().map(Conversation::from).collect(),
    ))
}

async fn create_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    JsonBody(create_conversation): JsonBody<CreateConversation>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let conversation = conversation_service
        .create_conversation(create_conversation.title)
        .await?;

    Ok((StatusCode::CREATED, Json(conversation.into())))
}

async fn get_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationWithMessages>, ApiError> {
    let (conversation, messages) = conversation_service
        .get_conversation(&conversation_id)
        .await?;

    Ok(Json(ConversationWithMessages::new(conversation, messages)))
}

async fn update_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<String>,
    JsonBody(update): JsonBody<UpdateConversation>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = conversation_service
        .update_conversation(&conversation_id, update.title)
        .await?;

    Ok(Json(conversation.into()))
}

async fn delete_conversation(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    conversation_service
        .delete_conversation(&conversation_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = conversation_service.list_messages(&conversation_id).await?;

    Ok(Json(messages.into_iter().map(Message::from).collect()))
}

async fn append_messages(
    Inject(conversation_service): Inject<dyn ConversationService>,
    Path(conversation_id): Path<String>,
    JsonBody(messages): JsonBody<Vec<NewMessage>>,
) -> Result<(StatusCode, Json<Vec<Message>>), ApiError> {
    let messages = conversation_service
        .append_messages(
            &conversation_id,
            messages.into_iter().map(Into::into).collect(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(messages.into_iter().map(Message::from).collect()),
    ))
}

pub mod schemas {
    use crate::infrastructure::entities::{self, MessageRole};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug, Default)]
    pub struct ListParams {
        pub skip: Option<i64>,
        pub limit: Option<i64>,
    }

    #[derive(Serialize, Deserialize, Debug, Default)]
    pub struct CreateConversation {
        #[serde(default)]
        pub title: Option<String>,
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct UpdateConversation {
        pub title: Option<String>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct Conversation {
        pub id: String,
        pub title: Option<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::Conversation> for Conversation {
        fn from(conversation: entities::Conversation) -> Self {
            Conversation {
                id: conversation.id,
                title: conversation.title,
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    pub struct Message {
        pub id: i64,
        pub role: MessageRole,
        pub content: String,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::Message> for Message {
        fn from(message: entities::Message) -> Self {
            Message {
                id: message.id,
                role: message.role,
                content: message.content,
                created_at: message.created_at,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    pub struct ConversationWithMessages {
        pub id: String,
        pub title: Option<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub messages: Vec<Message>,
    }

    impl ConversationWithMessages {
        pub fn new(conversation: entities::Conversation, messages: Vec<entities::Message>) -> Self {
            ConversationWithMessages {
                id: conversation.id,
                title: conversation.title,
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
                messages: messages.into_iter().map(Message::from).collect(),
            }
        }

        pub fn summary(&self) -> Conversation {
            Conversation {
                id: self.id.clone(),
                title: self.title.clone(),
                created_at: self.created_at,
                updated_at: self.updated_at,
            }
        }
    }

    /// `{role, content}`, as posted to the append and relay endpoints.
    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
    pub struct NewMessage {
        pub role: MessageRole,
        pub content: String,
    }

    impl From<NewMessage> for entities::MessageDraft {
        fn from(message: NewMessage) -> Self {
            entities::MessageDraft {
                role: message.role,
                content: message.content,
            }
        }
    }
}
