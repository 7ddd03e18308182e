// Translation of engine and service failures into HTTP responses. One request's
// failure is reported to that caller only; the server keeps running.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use screendiff::{DiffError, DiffErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error("diff worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("diff limiter is closed")]
    LimiterClosed,

    #[error("failed saving diff artifact: {0}")]
    Save(#[source] std::io::Error),

    #[error("failed building response: {0}")]
    Response(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Diff(e) => match e.kind() {
                DiffErrorKind::NotFound => StatusCode::NOT_FOUND,
                DiffErrorKind::Decode => StatusCode::UNPROCESSABLE_ENTITY,
                DiffErrorKind::Validation => StatusCode::BAD_REQUEST,
                DiffErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Diff(e) => e.kind().code(),
            _ => DiffErrorKind::Internal.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "diff request failed");
        } else {
            tracing::warn!(error = %self, "diff request rejected");
        }
        let body = ErrorBody {
            error: self.code(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
