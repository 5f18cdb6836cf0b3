//! Service error taxonomy and its HTTP translation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ApiResponse;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("user not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("model call failed: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt cache payload: {0}")]
    CacheCorrupt(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Caller-caused errors map to 4xx at the boundary, everything else is
    /// a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::UserNotFound
                | ServiceError::Validation(_)
                | ServiceError::EmailAlreadyExists
                | ServiceError::InvalidCredentials
                | ServiceError::Unauthorized(_)
        )
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::UserNotFound => (StatusCode::BAD_REQUEST, "UserNotFound"),
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ServiceError::EmailAlreadyExists => (StatusCode::BAD_REQUEST, "EmailAlreadyExists"),
            ServiceError::InvalidCredentials => (StatusCode::BAD_REQUEST, "InvalidCredentials"),
            ServiceError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ServiceError::Upstream(_) => (StatusCode::SERVICE_UNAVAILABLE, "UpstreamError"),
            ServiceError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StorageError"),
            ServiceError::CacheCorrupt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CacheCorrupt"),
            ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let message = self.to_string();
        if self.is_client_error() {
            tracing::warn!("{}: {}", code, message);
        } else {
            tracing::error!("{}: {}", code, message);
        }

        (status, Json(ApiResponse::<()>::error(code, &message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_server_errors_are_classified() {
        assert!(ServiceError::UserNotFound.is_client_error());
        assert!(ServiceError::InvalidCredentials.is_client_error());
        assert!(!ServiceError::Storage("down".into()).is_client_error());
        assert!(!ServiceError::CacheCorrupt("bad json".into()).is_client_error());
    }

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ServiceError::UserNotFound.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("missing header".into())
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Upstream("timeout".into()).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::CacheCorrupt("bad".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
