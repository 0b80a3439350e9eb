//! Application settings, read from the environment (and `.env` when present)

use di::{inject, injectable};

const DEFAULT_APP_NAME: &str = "Cloud Advisor API";
const DEFAULT_DATABASE_URL: &str = "sqlite://cloud_advisor.db?mode=rwc";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub database_url: String,
    /// Origin allowed by CORS.
    pub frontend_url: String,
    pub bind_address: String,
    pub provider: ProviderSettings,
}

/// Hosted model provider (any OpenAI-compatible chat completions API).
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[injectable]
impl Settings {
    #[inject]
    pub fn create() -> Settings {
        Settings::from_env()
    }
}

impl Settings {
    pub fn from_env() -> Settings {
        dotenvy::dotenv().ok();
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        Settings {
            app_name: var("APP_NAME", DEFAULT_APP_NAME),
            app_version: var("APP_VERSION", env!("CARGO_PKG_VERSION")),
            debug: lookup("DEBUG").is_some_and(|value| is_truthy(&value)),
            database_url: var("DATABASE_URL", DEFAULT_DATABASE_URL),
            frontend_url: var("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            bind_address: var("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            provider: ProviderSettings {
                api_key: lookup("LLM_API_KEY").filter(|key| !key.trim().is_empty()),
                base_url: var("LLM_BASE_URL", DEFAULT_LLM_BASE_URL)
                    .trim_end_matches('/')
                    .to_owned(),
                model: var("LLM_MODEL", DEFAULT_LLM_MODEL),
            },
        }
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is not set.
    pub fn log_directive(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
