use async_trait::async_trait;
use chrono::Utc;
use tracing::error;

use crate::database::DbPool;
use crate::domain::{NewUser, User};
use crate::error::ServiceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> Result<User, ServiceError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, ServiceError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
}

pub struct MySqlUserRepository {
    pool: DbPool,
}

impl MySqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, password, name, created_at, updated_at, deleted_at";

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User, ServiceError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating user: {}", e);
            let msg = e.to_string();
            if msg.contains("Duplicate entry") {
                ServiceError::EmailAlreadyExists
            } else {
                ServiceError::Storage(msg)
            }
        })?;

        Ok(User {
            id: result.last_insert_id() as i64,
            email: user.email.clone(),
            password: user.password.clone(),
            name: user.name.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding user by id: {}", e);
                ServiceError::Storage(e.to_string())
            })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER(?) AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding user by email: {}", e);
                ServiceError::Storage(e.to_string())
            })
    }
}
