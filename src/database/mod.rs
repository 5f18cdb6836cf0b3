//! MySQL pool bootstrap and embedded migrations.

use anyhow::Result;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

pub type DbPool = MySqlPool;

/// Connect to MySQL with bounded retries, then run pending migrations.
/// The database container is often still warming up when the service starts.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    let mut attempt: u32 = 0;
    let pool = loop {
        match MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) if attempt < config.connect_retries => {
                attempt += 1;
                warn!(
                    "Database connection failed (attempt {}/{}): {}",
                    attempt, config.connect_retries, e
                );
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Err(e) => return Err(e.into()),
        }
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}
