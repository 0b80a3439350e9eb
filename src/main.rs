//! Cloud Advisor web server
//!
//! (c) Softlandia 2025

use cloud_advisor::api;
use cloud_advisor::infrastructure::provider::OpenAiChatProvider;
use cloud_advisor::core::services::MyConversationService;
use cloud_advisor::infrastructure::config::Settings;
use cloud_advisor::infrastructure::database::{self, DatabaseConnection};
use cloud_advisor::infrastructure::repositories::DbConversationRepository;

use anyhow::anyhow;
use axum::http::{HeaderValue, Method};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::info;
use tokio::runtime::{Builder, Runtime};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();

    // initialize tracing
    cloud_advisor::init_tracing(settings.log_directive());

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(web_server_task(settings))
}

async fn web_server_task(settings: Settings) -> anyhow::Result<()> {
    let pool = database::open_pool(&settings.database_url).await?;
    sqlx::migrate!().run(&pool).await?;
    info!("database ready at {}", settings.database_url);
    DatabaseConnection::install_pool(pool);

    let provider = ServiceCollection::new()
        .add(Settings::singleton())
        .add(DatabaseConnection::singleton())
        .add(DbConversationRepository::scoped())
        .add(MyConversationService::scoped())
        .add(OpenAiChatProvider::singleton())
        .build_provider()
        .map_err(|e| anyhow!("invalid service configuration: {e:?}"))?;

    if settings.provider.api_key.is_none() {
        log::warn!("LLM_API_KEY is not set, /api/chat will fail until it is");
    }

    let app = api::router()
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_headers(Any)
                    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                    .allow_origin(settings.frontend_url.parse::<HeaderValue>()?),
            ),
        )
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {e}");
    }
}
