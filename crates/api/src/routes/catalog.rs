//! Catalog listing and stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::ItemId;
use doc_store::DocumentStore;
use ledger::normalize::{coerce_money, coerce_quantity};
use ledger::{CatalogFilter, CatalogItem, Money, NewCatalogItem};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AppState, parse_pipeline};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
}

/// Body of a listing request.
///
/// Price and quantity are accepted as numbers or strings; the price may be
/// given in cents (`unit_price_cents`) or major units (`unit_price`).
#[derive(Debug, Deserialize)]
pub struct ListItemRequest {
    pub id: Option<String>,
    pub name: String,
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub unit_price: Value,
    #[serde(default)]
    pub quantity: Value,
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Resolves a price given either in cents or in major units.
pub(crate) fn request_price(cents: Option<i64>, major: &Value) -> Result<Money, ApiError> {
    match cents {
        Some(cents) => Ok(Money::from_cents(cents)),
        None => coerce_money(major).map_err(|e| ApiError::BadRequest(format!("unit_price: {e}"))),
    }
}

// -- Handlers --

/// GET /catalog/{pipeline}: list items, optionally by category or in stock only.
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(pipeline): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CatalogItem>>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let filter = CatalogFilter {
        category: query.category,
        in_stock_only: query.in_stock,
    };
    Ok(Json(state.ledger.catalog.list(pipeline, &filter).await?))
}

/// GET /catalog/{pipeline}/{id}: load one item.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, id)): Path<(String, String)>,
) -> Result<Json<CatalogItem>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    Ok(Json(state.ledger.catalog.get(pipeline, &ItemId::new(id)).await?))
}

/// POST /catalog/{pipeline}: create or replace a listing.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(pipeline): Path<String>,
    Json(req): Json<ListItemRequest>,
) -> Result<(StatusCode, Json<CatalogItem>), ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let item = NewCatalogItem {
        id: req.id.map(ItemId::new),
        name: req.name,
        unit_price: request_price(req.unit_price_cents, &req.unit_price)?,
        quantity: coerce_quantity(&req.quantity)
            .map_err(|e| ApiError::BadRequest(format!("quantity: {e}")))?,
        category: req.category,
        metadata: req.metadata,
    };

    let listed = state.ledger.catalog.list_item(pipeline, item).await?;
    Ok((StatusCode::CREATED, Json(listed)))
}

/// POST /catalog/{pipeline}/{id}/adjust: apply a signed stock delta.
#[tracing::instrument(skip(state))]
pub async fn adjust<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, id)): Path<(String, String)>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let item_id = ItemId::new(id);
    let quantity = state
        .ledger
        .catalog
        .adjust_stock(pipeline, &item_id, req.delta)
        .await?;
    Ok(Json(StockResponse { item_id, quantity }))
}
