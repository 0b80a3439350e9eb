//! Chat relay endpoint

use crate::api::JsonBody;
use crate::api::chat::schemas::ChatRequest;
use crate::api::error::ApiError;
use crate::core::relay::{RelayTask, build_prompt};
use crate::core::traits::ChatProvider;
use async_stream::stream;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use di_axum::Inject;

/// Streams the model's reply as plain text, chunk by chunk.
///
/// Anything going wrong before the first chunk is a JSON error response. Later failures abort
/// the body.
pub async fn relay_chat(
    Inject(provider): Inject<dyn ChatProvider>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> Result<Response, ApiError> {
    let prompt = build_prompt(request.messages.into_iter().map(Into::into).collect())?;
    let upstream = provider.stream_completion(prompt).await?;

    let (task, mut receiver) = RelayTask::new(upstream);
    tokio::spawn(task.run());

    let body = stream! {
        while let Some(part) = receiver.recv().await {
            yield part;
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

pub mod schemas {
    use crate::api::conversations::schemas::NewMessage;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug)]
    pub struct ChatRequest {
        pub messages: Vec<NewMessage>,
    }
}
