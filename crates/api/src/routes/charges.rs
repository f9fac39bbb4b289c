//! Charge routes: matching, ledger generation and business-trip categories.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use chargebook_core::charge::{BusinessTripCategory, Transaction};
use chargebook_core::engine::LedgerOutcome;
use chargebook_core::matching::{AutoMatchResult, ChargeMatch};
use chargebook_core::store::Store;
use chargebook_shared::types::{ChargeId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// Creates the charge routes.
pub fn routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/charges/auto-match", post(auto_match::<S>))
        .route("/charges/{charge_id}/matches", get(find_matches::<S>))
        .route("/charges/{charge_id}/ledger", post(generate_ledger::<S>))
        .route(
            "/charges/{charge_id}/transactions/{transaction_id}/business-trip-category",
            patch(update_business_trip_category::<S>),
        )
}

/// Response for a match search.
#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    /// Charge the matches were searched for.
    pub charge_id: ChargeId,
    /// Candidates, best first.
    pub matches: Vec<ChargeMatch>,
}

/// Request body for setting a business-trip category. `null` clears it.
#[derive(Debug, Deserialize)]
pub struct BusinessTripCategoryRequest {
    /// New category.
    pub category: Option<BusinessTripCategory>,
}

/// GET `/charges/{charge_id}/matches` - Rank the charges that could complete this one.
async fn find_matches<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(charge_id): Path<ChargeId>,
) -> Result<Json<MatchesResponse>, ApiError> {
    let matches = state.engine.find_charge_matches(charge_id).await?;
    Ok(Json(MatchesResponse { charge_id, matches }))
}

/// POST `/charges/auto-match` - Assign every unambiguous item to its charge.
async fn auto_match<S: Store + 'static>(State(state): State<AppState<S>>) -> Result<Json<AutoMatchResult>, ApiError> {
    Ok(Json(state.engine.auto_match_charges().await?))
}

/// POST `/charges/{charge_id}/ledger` - Regenerate the charge's ledger records.
async fn generate_ledger<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(charge_id): Path<ChargeId>,
) -> Result<Json<LedgerOutcome>, ApiError> {
    Ok(Json(state.engine.generate_ledger(charge_id).await?))
}

/// PATCH `/charges/{charge_id}/transactions/{transaction_id}/business-trip-category`
async fn update_business_trip_category<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path((charge_id, transaction_id)): Path<(ChargeId, TransactionId)>,
    Json(payload): Json<BusinessTripCategoryRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let updated = state
        .engine
        .update_business_trip_transaction_category(charge_id, transaction_id, payload.category)
        .await?;
    Ok(Json(updated))
}
