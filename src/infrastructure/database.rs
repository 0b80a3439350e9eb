//! Pooled SQLite connection

use crate::infrastructure::config::Settings;
use di::{Ref, inject, injectable};
use log::error;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::RwLock;

const MAX_CONNECTIONS: u32 = 5;

/// Pool opened (and migrated) at startup. The DI container cannot be handed a pool directly,
/// so `DatabaseConnection::create` picks it up from here.
static INSTALLED_POOL: RwLock<Option<SqlitePool>> = RwLock::new(None);

pub struct DatabaseConnection {
    connection: SqlitePool,
}

#[injectable]
impl DatabaseConnection {
    #[inject]
    pub fn create(settings: Ref<Settings>) -> DatabaseConnection {
        let installed = INSTALLED_POOL
            .read()
            .ok()
            .and_then(|pool| pool.as_ref().cloned());

        let pool = installed.unwrap_or_else(|| {
            let options = SqliteConnectOptions::from_str(&settings.database_url)
                .unwrap_or_else(|e| {
                    error!(
                        "invalid DATABASE_URL {}: {e}, using an in-memory database",
                        settings.database_url
                    );
                    SqliteConnectOptions::new()
                })
                .foreign_keys(true);

            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_lazy_with(options)
        });

        DatabaseConnection { connection: pool }
    }
}

impl DatabaseConnection {
    /// Makes `pool` the one handed out to every `DatabaseConnection` built by the container.
    pub fn install_pool(pool: SqlitePool) {
        if let Ok(mut installed) = INSTALLED_POOL.write() {
            *installed = Some(pool);
        }
    }

    pub fn clear_installed_pool() {
        if let Ok(mut installed) = INSTALLED_POOL.write() {
            *installed = None;
        }
    }
}

/// Opens the database, creating the file when missing, with foreign keys enforced.
pub async fn open_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
}

impl Deref for DatabaseConnection {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for DatabaseConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}
