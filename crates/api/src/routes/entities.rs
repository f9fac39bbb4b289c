//! Financial entity routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use chargebook_core::engine::CancellationOutcome;
use chargebook_core::store::Store;
use chargebook_shared::types::FinancialEntityId;

use crate::{AppState, error::ApiError};

/// Creates the entity routes.
pub fn routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new().route(
        "/entities/{entity_id}/balance-cancellation",
        post(cancel_balances::<S>),
    )
}

/// POST `/entities/{entity_id}/balance-cancellation` - Recompute the entity's cancellation groups.
async fn cancel_balances<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(entity_id): Path<FinancialEntityId>,
) -> Result<Json<CancellationOutcome>, ApiError> {
    Ok(Json(state.engine.cancel_balances(entity_id).await?))
}
