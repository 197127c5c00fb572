//! Route modules for the twodiff server

pub mod health;
pub mod output;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ping", post(health::ping))
        .route("/upload/", post(sessions::register))
        .route(
            "/upload/:session_id",
            post(sessions::upload)
                .get(sessions::status)
                .delete(sessions::drop_session),
        )
        .nest("/static/output", output::router())
        // diff inputs are arbitrarily large and never buffered whole
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
