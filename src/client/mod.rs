//! Client for the chat relay and the conversation history API.
//!
//! `ChatState` is the view-model a UI renders from, `ChatSession` drives it through a turn, and
//! `transport` talks HTTP to the server.

pub mod session;
pub mod state;
pub mod transport;

pub use session::ChatSession;
pub use state::{ChatState, Notice, NoticeLevel, TranscriptEntry};
pub use transport::{ChatRelay, HistoryStore, HttpChatRelay, HttpHistoryStore};

use thiserror::Error;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached at all.
    #[error("server unreachable: {0}")]
    Unavailable(String),

    /// The server answered with a non-2xx status.
    #[error("{message} ({status})")]
    Status { status: u16, message: String },

    /// The reply stream broke off.
    #[error("reply interrupted: {0}")]
    Interrupted(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Rejected(String),
}

impl ClientError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::Unavailable(_))
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Server root, without a trailing slash.
    pub backend_url: String,
}

impl ClientSettings {
    pub fn from_env() -> ClientSettings {
        dotenvy::dotenv().ok();
        ClientSettings::new(
            std::env::var("BACKEND_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned()),
        )
    }

    pub fn new(backend_url: impl Into<String>) -> ClientSettings {
        ClientSettings {
            backend_url: backend_url.into().trim_end_matches('/').to_owned(),
        }
    }
}
