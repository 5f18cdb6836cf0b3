//! Chat handlers: ask a question, read the history projection.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::ApiResponse;
use crate::auth::AuthenticatedUser;
use crate::domain::HistoryEntry;
use crate::error::ServiceError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatQuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatQuestionResponse {
    pub answer: String,
}

/// POST /chat
pub async fn ask(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ChatQuestionRequest>,
) -> Result<Json<ApiResponse<ChatQuestionResponse>>, ServiceError> {
    let answer = state
        .chat
        .answer_question(user.user_id, &payload.question)
        .await?;
    Ok(Json(ApiResponse::success(ChatQuestionResponse { answer })))
}

/// GET /chat
pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>, ServiceError> {
    let entries = state.chat.history(user.user_id).await?;
    Ok(Json(ApiResponse::success(entries)))
}
