//! Database initialization

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::Config;

/// Connect the Postgres pool.
///
/// The schema is managed outside this crate; no migrations are run here.
pub async fn init_database(config: &Config) -> anyhow::Result<PgPool> {
    let db = &config.database;
    let target = redacted_url(&db.url);
    info!(database = %target, max_connections = db.max_connections, "Connecting to database");

    let pool = pool_options(db)
        .connect(config.database_url())
        .await
        .with_context(|| format!("Database connection to {target} failed"))?;

    info!(database = %target, "Database connected");
    Ok(pool)
}

fn pool_options(db: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .min_connections(db.min_connections.min(db.max_connections))
        .acquire_timeout(Duration::from_secs(db.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(db.idle_timeout_seconds))
}

/// `url` without its password, for logs
fn redacted_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some("***")).is_err() {
                return "<unprintable database url>".to_string();
            }
            parsed.to_string()
        }
        Err(_) => "<invalid database url>".to_string(),
    }
}
