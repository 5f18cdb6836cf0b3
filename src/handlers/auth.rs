//! Registration and login handlers.

use axum::{extract::State, Json};

use crate::api::ApiResponse;
use crate::error::ServiceError;
use crate::services::user_service::{LoginRequest, LoginResponse, RegisterRequest};
use crate::state::AppState;

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.users.register(payload).await?;
    Ok(Json(ApiResponse::success(())))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ServiceError> {
    let resp = state.users.login(payload).await?;
    Ok(Json(ApiResponse::success(resp)))
}
