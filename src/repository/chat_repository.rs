use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, Transaction};
use tracing::error;

use crate::database::DbPool;
use crate::domain::{ChatMessage, NewChatMessage};
use crate::error::ServiceError;

/// Both read paths serve the first page of a fixed-size window.
const PAGE_SIZE: i64 = 20;

/// Transactional unit for persisting a question/answer pair. Owned by one
/// engine invocation from begin to commit or rollback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransaction: Send {
    async fn insert(&mut self, message: &NewChatMessage) -> Result<(), ServiceError>;
    async fn commit(&mut self) -> Result<(), ServiceError>;
    async fn rollback(&mut self) -> Result<(), ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ChatTransaction>, ServiceError>;

    /// Messages for conversation replay, oldest first.
    async fn get_messages_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, ServiceError>;

    /// Messages for display, newest first.
    async fn get_history_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, ServiceError>;
}

pub struct MySqlChatRepository {
    pool: DbPool,
}

impl MySqlChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const CHAT_COLUMNS: &str = "id, user_id, name, message, created_at, updated_at, deleted_at";

#[async_trait]
impl ChatRepository for MySqlChatRepository {
    async fn begin(&self) -> Result<Box<dyn ChatTransaction>, ServiceError> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::Storage(e.to_string())
        })?;
        Ok(Box::new(MySqlChatTransaction { tx: Some(tx) }))
    }

    async fn get_messages_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, ServiceError> {
        let query = format!(
            "SELECT {CHAT_COLUMNS} FROM chats \
             WHERE user_id = ? AND deleted_at IS NULL \
             ORDER BY id ASC LIMIT ?"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(user_id)
            .bind(PAGE_SIZE)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error reading messages for replay: {}", e);
                ServiceError::Storage(e.to_string())
            })
    }

    async fn get_history_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, ServiceError> {
        let query = format!(
            "SELECT {CHAT_COLUMNS} FROM chats \
             WHERE user_id = ? AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT ?"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(user_id)
            .bind(PAGE_SIZE)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error reading chat history: {}", e);
                ServiceError::Storage(e.to_string())
            })
    }
}

/// A dropped inner `sqlx::Transaction` rolls back, so an abandoned unit
/// never leaves the transaction open.
pub struct MySqlChatTransaction {
    tx: Option<Transaction<'static, MySql>>,
}

impl MySqlChatTransaction {
    fn take(&mut self) -> Result<Transaction<'static, MySql>, ServiceError> {
        self.tx
            .take()
            .ok_or_else(|| ServiceError::Storage("transaction already closed".to_string()))
    }
}

#[async_trait]
impl ChatTransaction for MySqlChatTransaction {
    async fn insert(&mut self, message: &NewChatMessage) -> Result<(), ServiceError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| ServiceError::Storage("transaction already closed".to_string()))?;

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO chats (user_id, name, message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.user_id)
        .bind(&message.name)
        .bind(&message.message)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("Database error inserting chat message: {}", e);
            ServiceError::Storage(e.to_string())
        })?;

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ServiceError> {
        self.take()?.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::Storage(e.to_string())
        })
    }

    async fn rollback(&mut self) -> Result<(), ServiceError> {
        self.take()?.rollback().await.map_err(|e| {
            error!("Failed to roll back transaction: {}", e);
            ServiceError::Storage(e.to_string())
        })
    }
}
