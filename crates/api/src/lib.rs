//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes over [`ChargeEngine`]
//! - The JSON error envelope
//!
//! The router is generic over the store so tests can serve it from memory.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use chargebook_core::engine::ChargeEngine;
use chargebook_core::store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
pub struct AppState<S> {
    /// Reconciliation engine.
    pub engine: Arc<ChargeEngine<S>>,
}

impl<S> AppState<S> {
    /// Creates the state around an engine.
    pub fn new(engine: ChargeEngine<S>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

/// Creates the main application router.
pub fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
