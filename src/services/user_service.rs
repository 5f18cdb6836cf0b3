//! Registration and login.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::JwtManager;
use crate::domain::NewUser;
use crate::error::ServiceError;
use crate::repository::UserRepository;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    jwt: Arc<JwtManager>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, jwt: Arc<JwtManager>) -> Self {
        Self { user_repo, jwt }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<(), ServiceError> {
        if !req.email.contains('@') {
            warn!("Registration rejected: email not valid");
            return Err(ServiceError::Validation("email not valid".to_string()));
        }

        if self.user_repo.get_by_email(&req.email).await?.is_some() {
            warn!("Registration rejected: email already exists");
            return Err(ServiceError::EmailAlreadyExists);
        }

        let password = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
            .map_err(|e| ServiceError::Internal(format!("password hash error: {e}")))?;

        let user = self
            .user_repo
            .create(&NewUser {
                email: req.email,
                password,
                name: req.name,
            })
            .await?;

        info!("User registered: {}", user.id);
        Ok(())
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        if !req.email.contains('@') {
            warn!("Login rejected: email not valid");
            return Err(ServiceError::Validation("email not valid".to_string()));
        }

        let user = self
            .user_repo
            .get_by_email(&req.email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let valid = bcrypt::verify(&req.password, &user.password)
            .map_err(|_| ServiceError::InvalidCredentials)?;
        if !valid {
            warn!("Login rejected: password not valid");
            return Err(ServiceError::InvalidCredentials);
        }

        let access_token = self
            .jwt
            .generate_token(user.id)
            .map_err(|e| ServiceError::Internal(format!("token generation error: {e}")))?;

        info!("Login successful: {}", user.id);
        Ok(LoginResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            access_token,
        })
    }
}
