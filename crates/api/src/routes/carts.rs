//! Cart endpoints. The acting user is the `{owner}` path segment.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ActorId, ItemId, LineId};
use doc_store::DocumentStore;
use ledger::normalize::coerce_quantity;
use ledger::{CartLine, CartView, Order};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AppState, parse_pipeline};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub item_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub quantity: Value,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

// -- Handlers --

/// GET /carts/{pipeline}/{owner}: lines with live availability.
#[tracing::instrument(skip(state))]
pub async fn view<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, owner)): Path<(String, String)>,
) -> Result<Json<CartView>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let view = state.ledger.carts.view(pipeline, &ActorId::new(owner)).await?;
    Ok(Json(view))
}

/// POST /carts/{pipeline}/{owner}/lines: add an item, reserving stock.
#[tracing::instrument(skip(state))]
pub async fn add_line<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, owner)): Path<(String, String)>,
    Json(req): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    if req.item_id.trim().is_empty() {
        return Err(ApiError::BadRequest("item_id is required".to_string()));
    }

    let line = state
        .ledger
        .carts
        .add_line(pipeline, &ActorId::new(owner), &ItemId::new(req.item_id))
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// PATCH /carts/{pipeline}/{owner}/lines/{line_id}: change a line's quantity.
#[tracing::instrument(skip(state))]
pub async fn update_line<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, owner, line_id)): Path<(String, String, String)>,
    Json(req): Json<UpdateLineRequest>,
) -> Result<Json<CartLine>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let quantity = coerce_quantity(&req.quantity)
        .map_err(|e| ApiError::BadRequest(format!("quantity: {e}")))?;

    let line = state
        .ledger
        .carts
        .update_quantity(pipeline, &ActorId::new(owner), &LineId::new(line_id), quantity)
        .await?;
    Ok(Json(line))
}

/// DELETE /carts/{pipeline}/{owner}/lines/{line_id}: remove a line, restoring stock.
#[tracing::instrument(skip(state))]
pub async fn remove_line<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, owner, line_id)): Path<(String, String, String)>,
) -> Result<Json<CartLine>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let line = state
        .ledger
        .carts
        .remove_line(pipeline, &ActorId::new(owner), &LineId::new(line_id))
        .await?;
    Ok(Json(line))
}

/// DELETE /carts/{pipeline}/{owner}: drop every line without restocking.
#[tracing::instrument(skip(state))]
pub async fn clear<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, owner)): Path<(String, String)>,
) -> Result<Json<ClearResponse>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let removed = state.ledger.carts.clear(pipeline, &ActorId::new(owner)).await?;
    Ok(Json(ClearResponse { removed }))
}

/// POST /carts/{pipeline}/{owner}/checkout: turn the cart into a pending order.
#[tracing::instrument(skip(state))]
pub async fn checkout<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, owner)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let order = state
        .ledger
        .orders
        .checkout(pipeline, &ActorId::new(owner))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
