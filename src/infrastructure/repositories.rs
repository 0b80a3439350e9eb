//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{Conversation, Message, MessageDraft};
use crate::infrastructure::traits::ConversationRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, injectable};
use log::error;

#[injectable(ConversationRepository)]
pub struct DbConversationRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl ConversationRepository for DbConversationRepository {
    async fn list_conversations(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Conversation>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, created_at, updated_at FROM conversations ORDER BY updated_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn find_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn create_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(conversation.id)
        .bind(conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        title: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE conversations SET title = COALESCE(?, title), updated_at = MAX(updated_at, ?) WHERE id = ? RETURNING *",
        )
        .bind(title)
        .bind(now)
        .bind(conversation_id)
        .fetch_optional(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.connection.begin().await?;

        // the foreign key cascades too, this keeps it independent of the pragma
        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| error!("{e}"))?;

        let deleted = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| error!("{e}"))?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted > 0)
    }

    async fn list_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, conversation_id, role, content, created_at FROM messages WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn append_messages(
        &self,
        conversation_id: &str,
        messages: Vec<MessageDraft>,
        now: DateTime<Utc>,
    ) -> Result<Option<(Conversation, Vec<Message>)>, sqlx::Error> {
        let mut tx = self.connection.begin().await?;

        // the first statement must write: a deferred read upgraded to a write fails with
        // SQLITE_BUSY instead of waiting for a concurrent append to commit
        let conversation: Option<Conversation> = sqlx::query_as(
            "UPDATE conversations SET updated_at = MAX(updated_at, ?) WHERE id = ? RETURNING *",
        )
        .bind(now)
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await
        .inspect_err(|e| error!("{e}"))?;

        // dropping `tx` rolls back, the update matched no row anyway
        let Some(mut conversation) = conversation else {
            return Ok(None);
        };

        let title = conversation.generated_title(&messages);

        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            let row: Message = sqlx::query_as(
                "INSERT INTO messages (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?) RETURNING *",
            )
            .bind(conversation_id)
            .bind(message.role)
            .bind(message.content)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .inspect_err(|e| error!("{e}"))?;
            stored.push(row);
        }

        if let Some(title) = title {
            conversation = sqlx::query_as(
                "UPDATE conversations SET title = ? WHERE id = ? RETURNING *",
            )
            .bind(title)
            .bind(conversation_id)
            .fetch_one(&mut *tx)
            .await
            .inspect_err(|e| error!("{e}"))?;
        }

        tx.commit().await?;

        Ok(Some((conversation, stored)))
    }
}
