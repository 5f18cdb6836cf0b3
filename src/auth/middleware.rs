//! Bearer-token extraction: resolves the authenticated user id as a typed
//! handler argument.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ServiceError;
use crate::state::AppState;

pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("invalid Authorization header".to_string()))?;

        let claims = state
            .jwt
            .validate_token(token)
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))?;

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
        })
    }
}
