//! HTTP access to the relay endpoint and the conversation API.

use crate::api::chat::schemas::ChatRequest;
use crate::api::conversations::schemas::{
    Conversation, ConversationWithMessages, CreateConversation, Message, NewMessage,
    UpdateConversation,
};
use crate::api::error::ErrorBody;
use crate::client::{ClientError, ClientSettings};
use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Reply text, decoded, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<String, ClientError>>;

#[async_trait]
pub trait ChatRelay: Send + Sync {
    async fn open(&self, messages: Vec<NewMessage>) -> Result<ChunkStream, ClientError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Conversation>, ClientError>;

    async fn create(&self, title: Option<String>) -> Result<Conversation, ClientError>;

    async fn get(&self, conversation_id: &str) -> Result<ConversationWithMessages, ClientError>;

    async fn rename(&self, conversation_id: &str, title: String)
    -> Result<Conversation, ClientError>;

    async fn delete(&self, conversation_id: &str) -> Result<(), ClientError>;

    async fn append(
        &self,
        conversation_id: &str,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<Message>, ClientError>;
}

pub struct HttpChatRelay {
    client: Client,
    endpoint: String,
}

impl HttpChatRelay {
    pub fn new(settings: &ClientSettings) -> Self {
        HttpChatRelay {
            client: Client::new(),
            endpoint: format!("{}/api/chat", settings.backend_url),
        }
    }
}

#[async_trait]
impl ChatRelay for HttpChatRelay {
    async fn open(&self, messages: Vec<NewMessage>) -> Result<ChunkStream, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { messages })
            .send()
            .await
            .map_err(unavailable)?;
        let response = ensure_success(response).await?;

        let mut bytes = Box::pin(response.bytes_stream());

        Ok(Box::pin(stream! {
            let mut decoder = Utf8Decoder::default();
            let mut interrupted = false;

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        let text = decoder.push(&chunk);
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(ClientError::Interrupted(e.to_string()));
                        interrupted = true;
                        break;
                    }
                }
            }

            if !interrupted {
                let rest = decoder.finish();
                if !rest.is_empty() {
                    yield Ok(rest);
                }
            }
        }))
    }
}

pub struct HttpHistoryStore {
    client: Client,
    base_url: String,
}

impl HttpHistoryStore {
    pub fn new(settings: &ClientSettings) -> Self {
        HttpHistoryStore {
            client: Client::new(),
            base_url: format!("{}/api/conversations", settings.backend_url),
        }
    }

    fn url(&self, conversation_id: &str) -> String {
        format!("{}/{conversation_id}", self.base_url)
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn list(&self) -> Result<Vec<Conversation>, ClientError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(unavailable)?;
        json(response).await
    }

    async fn create(&self, title: Option<String>) -> Result<Conversation, ClientError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&CreateConversation { title })
            .send()
            .await
            .map_err(unavailable)?;
        json(response).await
    }

    async fn get(&self, conversation_id: &str) -> Result<ConversationWithMessages, ClientError> {
        let response = self
            .client
            .get(self.url(conversation_id))
            .send()
            .await
            .map_err(unavailable)?;
        json(response).await
    }

    async fn rename(
        &self,
        conversation_id: &str,
        title: String,
    ) -> Result<Conversation, ClientError> {
        let response = self
            .client
            .patch(self.url(conversation_id))
            .json(&UpdateConversation { title: Some(title) })
            .send()
            .await
            .map_err(unavailable)?;
        json(response).await
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(conversation_id))
            .send()
            .await
            .map_err(unavailable)?;
        ensure_success(response).await.map(|_| ())
    }

    async fn append(
        &self,
        conversation_id: &str,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<Message>, ClientError> {
        let response = self
            .client
            .post(format!("{}/messages", self.url(conversation_id)))
            .json(&messages)
            .send()
            .await
            .map_err(unavailable)?;
        json(response).await
    }
}

fn unavailable(error: reqwest::Error) -> ClientError {
    debug!("request failed: {error}");
    ClientError::Unavailable(error.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    };
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    ensure_success(response)
        .await?
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Decodes a byte stream as UTF-8, holding back a character that is split across chunks.
#[derive(Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_owned();
                self.pending.clear();
                text
            }
            Err(e) => {
                let valid = e.valid_up_to();
                match e.error_len() {
                    // incomplete sequence at the end, keep it for the next chunk
                    None => {
                        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                        self.pending.drain(..valid);
                        text
                    }
                    Some(invalid) => {
                        let end = valid + invalid;
                        let mut text = String::from_utf8_lossy(&self.pending[..end]).into_owned();
                        self.pending.drain(..end);
                        text.push_str(&self.push(&[]));
                        text
                    }
                }
            }
        }
    }

    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}
