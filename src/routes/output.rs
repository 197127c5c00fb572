//! Result file serving
//!
//! Serves the diff outputs written by the engine as static resources; the
//! locator stored on a completed session points here.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the output router
pub fn router() -> Router<AppState> {
    Router::new().route("/:name", get(serve_output))
}

/// Serve a produced diff file
async fn serve_output(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    // single path segment only; the route shape already rejects '/'
    if name.contains("..") || name.contains('\\') {
        return Err(AppError::NotFound(name));
    }

    let path = state.config().upload.output_dir.join(&name);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(name.clone())
        } else {
            AppError::from(e)
        }
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", name),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}
