use crate::api::error::{ApiError, json_error_body, route_not_found};
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::middleware::map_response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;

pub mod chat;
pub mod conversations;
pub mod error;
pub mod meta;

/// Every route the server exposes. Layers and the service provider are added by the caller.
pub fn router() -> Router {
    Router::new()
        .route("/", get(meta::index))
        .route("/health", get(meta::health))
        .route("/api/chat", post(chat::relay_chat))
        .nest("/api/conversations", conversations::router())
        .fallback(route_not_found)
        .layer(map_response(json_error_body))
}

/// `Json` whose rejection is reported as `{"error": ...}`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// `Query` whose rejection is reported as `{"error": ...}`.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, ApiError> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(QueryParams(value))
    }
}
