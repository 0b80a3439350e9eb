//! Shared test setup: in-memory database, scripted model, router and live server.
#![allow(dead_code)]

use async_trait::async_trait;
use cloud_advisor::api;
use cloud_advisor::core::error::RelayError;
use cloud_advisor::core::relay::{ChatMessage, TextStream};
use cloud_advisor::core::services::MyConversationService;
use cloud_advisor::core::traits::ChatProvider;
use cloud_advisor::infrastructure::config::Settings;
use cloud_advisor::infrastructure::database::DatabaseConnection;
use cloud_advisor::infrastructure::repositories::DbConversationRepository;
use di::{Injectable, ServiceCollection, inject, injectable};
use di_axum::RouterServiceProviderExtensions;
use futures_util::stream;
use sqlx::SqlitePool;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counter for unique test database URIs
static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Setup test database with migrations and returns pool
/// Uses in-memory SQLite for test isolation
pub async fn setup_test_db() -> SqlitePool {
    let db_num = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    // Use file URI format with shared cache - each test gets a unique DB
    let db_url = format!("sqlite:file:testdb{}?mode=memory&cache=shared", db_num);

    let pool = SqlitePool::connect(&db_url).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    // Every DatabaseConnection the container builds hands out this pool
    DatabaseConnection::install_pool(pool.clone());

    pool
}

/// Clean up after test
pub fn cleanup_test_db() {
    DatabaseConnection::clear_installed_pool();
    script_reply(Vec::new());
}

/// What the scripted model does, in order.
#[derive(Clone, Debug)]
pub enum Step {
    Text(&'static str),
    /// Breaks the stream after the preceding steps were sent.
    Fail(&'static str),
    /// Rejects the request before streaming, like a provider answering non-2xx.
    Refuse(u16),
}

static SCRIPT: Mutex<Vec<Step>> = Mutex::new(Vec::new());
static RECEIVED: Mutex<Vec<Vec<ChatMessage>>> = Mutex::new(Vec::new());

pub fn script_reply(steps: Vec<Step>) {
    *SCRIPT.lock().unwrap() = steps;
    RECEIVED.lock().unwrap().clear();
}

/// Prompts the scripted model has been asked to complete.
pub fn received_prompts() -> Vec<Vec<ChatMessage>> {
    RECEIVED.lock().unwrap().clone()
}

pub struct ScriptedProvider;

#[injectable(ChatProvider)]
impl ScriptedProvider {
    #[inject]
    pub fn create() -> ScriptedProvider {
        ScriptedProvider
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<TextStream, RelayError> {
        RECEIVED.lock().unwrap().push(messages);
        let steps = SCRIPT.lock().unwrap().clone();

        if let Some(Step::Refuse(status)) = steps.first() {
            return Err(RelayError::Upstream {
                status: *status,
                message: "scripted refusal".into(),
            });
        }

        let items: Vec<Result<String, RelayError>> = steps
            .into_iter()
            .map(|step| match step {
                Step::Text(text) => Ok(text.to_owned()),
                Step::Fail(reason) => Err(RelayError::Transport(reason.to_owned())),
                Step::Refuse(status) => Err(RelayError::Upstream {
                    status,
                    message: "scripted refusal".into(),
                }),
            })
            .collect();

        Ok(Box::pin(stream::iter(items)))
    }
}

/// Create test app - uses the pool installed by setup_test_db()
pub fn create_test_app() -> axum::Router {
    let provider = ServiceCollection::new()
        .add(Settings::singleton())
        .add(DatabaseConnection::transient())
        .add(DbConversationRepository::scoped())
        .add(MyConversationService::scoped())
        .add(ScriptedProvider::singleton())
        .build_provider()
        .unwrap();

    api::router().with_provider(provider)
}

/// Serves the test app on an ephemeral port, returns its base URL.
pub async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = create_test_app();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{address}")
}
