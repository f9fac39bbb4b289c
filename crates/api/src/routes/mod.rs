//! API route definitions.

use axum::Router;
use chargebook_core::store::Store;

use crate::AppState;

pub mod charges;
pub mod entities;
pub mod health;

/// Creates the `/api/v1` router.
pub fn api_routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new().merge(charges::routes()).merge(entities::routes())
}
