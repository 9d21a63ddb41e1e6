//! Typed application error, mapped onto the HTTP surface at the edge.
//!
//! Handlers return `Result<_, AppError>` and use `?` freely; `AppError`
//! carries enough information to render the uniform `{ok: false, error, detail?}`
//! JSON body and pick the right status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    Auth,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no refresh token for owner")]
    NoRefreshToken,

    #[error("send failed: {0}")]
    SendError(String),

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn tag(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Auth => "auth",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::NoRefreshToken => "no_refresh_token",
            AppError::SendError(_) => "send_error",
            AppError::Db(_) => "db_error",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoRefreshToken => StatusCode::BAD_REQUEST,
            AppError::SendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = Json(json!({
            "ok": false,
            "error": self.tag(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}
