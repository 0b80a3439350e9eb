//! OpenAI-compatible chat completions client, streaming.
//!

use crate::core::error::RelayError;
use crate::core::relay::{ChatMessage, TextStream};
use crate::core::traits::ChatProvider;
use crate::infrastructure::config::{ProviderSettings, Settings};
use async_stream::stream;
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use futures_util::StreamExt;
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAiChatProvider {
    client: Client,
    settings: ProviderSettings,
}

#[injectable(ChatProvider)]
impl OpenAiChatProvider {
    #[inject]
    pub fn create(settings: Ref<Settings>) -> OpenAiChatProvider {
        OpenAiChatProvider {
            client: Client::new(),
            settings: settings.provider.clone(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<TextStream, RelayError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| RelayError::Configuration("LLM_API_KEY is not set".into()))?;

        let body = CompletionRequest {
            model: &self.settings.model,
            messages: &messages,
            stream: true,
        };

        info!(
            "requesting completion from {} with {} messages",
            self.settings.model,
            messages.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!("chat provider returned {status}: {message}");
            return Err(RelayError::Upstream { status, message });
        }

        let mut bytes = Box::pin(response.bytes_stream());

        Ok(Box::pin(stream! {
            let mut decoder = SseDecoder::default();

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(RelayError::Transport(e.to_string()));
                        break 'read;
                    }
                };

                for event in decoder.push(&chunk) {
                    match event {
                        SseEvent::Text(text) => yield Ok(text),
                        SseEvent::Failed(message) => {
                            yield Err(RelayError::Upstream { status: 200, message });
                            break 'read;
                        }
                        SseEvent::Done => break 'read,
                    }
                }
            }

            debug!("completion stream closed");
        }))
    }
}

#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Text(String),
    Failed(String),
    Done,
}

/// Splits a `text/event-stream` body into completion events.
///
/// Lines can be cut anywhere by the transport, so incomplete lines are kept until the rest
/// arrives.
#[derive(Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(CompletionChunk {
            error: Some(error), ..
        }) => Some(SseEvent::Failed(error.message)),
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map(SseEvent::Text),
        Err(e) => {
            debug!("skipping unparsable completion chunk: {e}");
            None
        }
    }
}
