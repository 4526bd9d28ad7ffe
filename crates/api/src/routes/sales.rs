//! Sales report endpoints. Reads never fail; missing data reports as zero.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use doc_store::DocumentStore;
use ledger::{ProductSales, SalesRanking, SalesSummary};
use serde::Deserialize;

use super::{AppState, parse_pipeline};
use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub by: SalesRanking,
}

/// GET /sales/{pipeline}/summary: global totals.
#[tracing::instrument(skip(state))]
pub async fn summary<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(pipeline): Path<String>,
) -> Result<Json<SalesSummary>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    Ok(Json(state.ledger.sales.summary(pipeline).await))
}

/// GET /sales/{pipeline}/products: best sellers by revenue or units.
#[tracing::instrument(skip(state))]
pub async fn products<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(pipeline): Path<String>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<ProductSales>>, ApiError> {
    let pipeline = parse_pipeline(&pipeline)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(
        state
            .ledger
            .sales
            .top_products(pipeline, query.by, limit)
            .await,
    ))
}
