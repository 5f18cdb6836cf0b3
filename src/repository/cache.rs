use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::ServiceError;

/// Key-value store with expiry. Entries are shared mutable state across all
/// callers for a given key; the engine never assumes exclusive ownership.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError>;
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        info!("Connecting to Redis");
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        debug!("Cache GET {}", key);
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(|e| {
            error!("Cache read failed for {}: {}", key, e);
            ServiceError::Storage(e.to_string())
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError> {
        debug!("Cache SET {} (ttl {:?})", key, ttl);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| {
                error!("Cache write failed for {}: {}", key, e);
                ServiceError::Storage(e.to_string())
            })
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        debug!("Cache DEL {}", key);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| {
            error!("Cache delete failed for {}: {}", key, e);
            ServiceError::Storage(e.to_string())
        })
    }
}
