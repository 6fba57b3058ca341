//! HTTP proxy in front of the upstream key-value service.
//!
//! # Endpoints
//!
//! - `POST /api/kv-get`: `{key}` -> `{value}`
//! - `POST /api/kv-set`: `{key, value}` -> `{ok}`
//! - `POST /api/kv-incr`: `{key}` -> `{value}`
//! - `POST /api/kv-merge`: `{stateKey, patch, revKey}` -> `{ok, rev, state}`
//! - `GET /health`: health check
//!
//! Any other method on an `/api` route answers 405.

mod error;
mod handlers;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use coral_club_core::KvStore;
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
}

impl AppState {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/kv-get", post(handlers::kv_get))
        .route("/kv-set", post(handlers::kv_set))
        .route("/kv-incr", post(handlers::kv_incr))
        .route("/kv-merge", post(handlers::kv_merge));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
