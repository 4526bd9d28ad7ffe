//! HTTP route handlers.

pub mod carts;
pub mod catalog;
pub mod growth;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod sales;

use doc_store::DocumentStore;
use ledger::{Ledger, Pipeline};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub ledger: Ledger<S>,
}

/// Parses the `{pipeline}` path segment (`plants` or `materials`).
pub(crate) fn parse_pipeline(raw: &str) -> Result<Pipeline, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}
