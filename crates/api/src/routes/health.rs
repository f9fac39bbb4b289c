//! Liveness check.

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Liveness response. Does not touch the store.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Crate version of the API layer.
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "chargebook",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /health`, usable under any router state.
pub fn routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health))
}
