//! Growth record promotion endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use doc_store::DocumentStore;
use ledger::CatalogItem;
use ledger::normalize::coerce_quantity;
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use super::catalog::request_price;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub quantity: Value,
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub unit_price: Value,
}

/// POST /growth/{record_id}/promote: move a grown plant into inventory.
#[tracing::instrument(skip(state, req))]
pub async fn promote<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(record_id): Path<String>,
    Json(req): Json<PromoteRequest>,
) -> Result<(StatusCode, Json<CatalogItem>), ApiError> {
    let quantity = coerce_quantity(&req.quantity)
        .map_err(|e| ApiError::BadRequest(format!("quantity: {e}")))?;
    let unit_price = request_price(req.unit_price_cents, &req.unit_price)?;

    let item = state
        .ledger
        .catalog
        .promote_plant(&record_id, quantity, unit_price)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}
