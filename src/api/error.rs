//! Mapping of domain errors onto HTTP responses

use crate::core::error::{RelayError, ServiceError};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of every non-2xx response.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", .0.body_text())]
    Json(#[from] JsonRejection),

    #[error("{}", .0.body_text())]
    Query(#[from] QueryRejection),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Rejected by the router itself: unknown path, wrong method.
    #[error("{message}")]
    Route { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Json(rejection) => rejection.status(),
            ApiError::Query(rejection) => rejection.status(),
            ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Service(ServiceError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Service(ServiceError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Relay(RelayError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Relay(RelayError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Relay(RelayError::Upstream { .. } | RelayError::Transport(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Route { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                ApiError::Service(ServiceError::Storage(source)) => error!("{self}: {source}"),
                _ => error!("{self}"),
            }
        } else {
            debug!("rejected request ({status}): {self}");
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Router fallback for paths no route matches.
pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::Route {
        status: StatusCode::NOT_FOUND,
        message: format!("no route for {}", uri.path()),
    }
}

/// Gives error responses produced outside the handlers, such as axum's 405, an `{error}` body.
pub async fn json_error_body(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if !(status.is_client_error() || status.is_server_error()) || is_json {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut rewritten = ApiError::Route {
        status,
        message: status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    }
    .into_response();

    if let Some(allow) = allow {
        rewritten.headers_mut().insert(header::ALLOW, allow);
    }
    rewritten
}
