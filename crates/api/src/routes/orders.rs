//! Order lookup and state transition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{ActorId, OrderId};
use doc_store::DocumentStore;
use ledger::{Order, OrderStatus};
use serde::Deserialize;

use super::{AppState, parse_pipeline};
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub buyer: Option<String>,
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}

/// GET /orders/{pipeline}: list orders, optionally by status and buyer.
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(pipeline): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let buyer = query.buyer.map(ActorId::new);

    let orders = state
        .ledger
        .orders
        .list(pipeline, status, buyer.as_ref())
        .await?;
    Ok(Json(orders))
}

/// GET /orders/{pipeline}/{id}: load an order from any partition.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let order = state.ledger.orders.get(pipeline, parse_order_id(&id)?).await?;
    Ok(Json(order))
}

/// POST /orders/{pipeline}/{id}/confirm: realize the sale.
#[tracing::instrument(skip(state))]
pub async fn confirm<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let order = state
        .ledger
        .orders
        .confirm(pipeline, parse_order_id(&id)?)
        .await?;
    Ok(Json(order))
}

/// POST /orders/{pipeline}/{id}/cancel: return the order's stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((pipeline, id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let order = state
        .ledger
        .orders
        .cancel(pipeline, parse_order_id(&id)?)
        .await?;
    Ok(Json(order))
}
