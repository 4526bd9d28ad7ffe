//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger::LedgerError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Ledger operation error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(err) => ledger_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, String) {
    let status = match &err {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::OutOfStock { .. }
        | LedgerError::InsufficientStock { .. }
        | LedgerError::DuplicateLine { .. }
        | LedgerError::InvalidTransition { .. }
        | LedgerError::AlreadyTerminal { .. }
        | LedgerError::TransactionConflict { .. } => StatusCode::CONFLICT,
        LedgerError::EmptyCart { .. }
        | LedgerError::InvalidQuantity { .. }
        | LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LedgerError::Store(e) if e.is_conflict() => StatusCode::CONFLICT,
        LedgerError::InvalidDocument { .. }
        | LedgerError::Store(_)
        | LedgerError::Serialization(_) => {
            tracing::error!(error = %err, "ledger failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}
