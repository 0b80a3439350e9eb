//! Cloud Advisor - chat relay and conversation history server, plus its client
//!
//! (c) Softlandia 2025

pub mod api;
pub mod client;
pub mod core;
pub mod infrastructure;

use tracing_subscriber::EnvFilter;

/// Installs the `fmt` subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
