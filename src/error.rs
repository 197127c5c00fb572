//! Error types for the twodiff server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
///
/// Every variant is terminal for the request that raised it; nothing here is
/// retried internally.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session expired: {0}")]
    Gone(String),

    #[error("session not accepting uploads: {0}")]
    Conflict(String),

    #[error("bad upload payload: {0}")]
    BadInput(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("diff produced no result: {0}")]
    EngineFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::EngineFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "SESSION_NOT_FOUND",
            Self::Gone(_) => "SESSION_EXPIRED",
            Self::Conflict(_) => "SESSION_BUSY",
            Self::BadInput(_) => "BAD_UPLOAD",
            Self::Timeout(_) => "TIMEOUT",
            Self::EngineFailure(_) => "ENGINE_FAILURE",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}
