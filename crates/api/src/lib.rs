//! HTTP API server with observability for the nursery order and inventory ledger.
//!
//! Provides REST endpoints for the catalog, carts, orders and sales reports
//! of both pipelines, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use doc_store::DocumentStore;
use ledger::{Ledger, LedgerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/catalog/{pipeline}",
            get(routes::catalog::list::<S>).post(routes::catalog::create::<S>),
        )
        .route("/catalog/{pipeline}/{id}", get(routes::catalog::get::<S>))
        .route(
            "/catalog/{pipeline}/{id}/adjust",
            post(routes::catalog::adjust::<S>),
        )
        .route(
            "/growth/{record_id}/promote",
            post(routes::growth::promote::<S>),
        )
        .route(
            "/carts/{pipeline}/{owner}",
            get(routes::carts::view::<S>).delete(routes::carts::clear::<S>),
        )
        .route(
            "/carts/{pipeline}/{owner}/lines",
            post(routes::carts::add_line::<S>),
        )
        .route(
            "/carts/{pipeline}/{owner}/lines/{line_id}",
            axum::routing::patch(routes::carts::update_line::<S>)
                .delete(routes::carts::remove_line::<S>),
        )
        .route(
            "/carts/{pipeline}/{owner}/checkout",
            post(routes::carts::checkout::<S>),
        )
        .route("/orders/{pipeline}", get(routes::orders::list::<S>))
        .route("/orders/{pipeline}/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{pipeline}/{id}/confirm",
            post(routes::orders::confirm::<S>),
        )
        .route(
            "/orders/{pipeline}/{id}/cancel",
            post(routes::orders::cancel::<S>),
        )
        .route(
            "/sales/{pipeline}/summary",
            get(routes::sales::summary::<S>),
        )
        .route(
            "/sales/{pipeline}/products",
            get(routes::sales::products::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a document store.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    config: LedgerConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        ledger: Ledger::new(store, config),
    })
}
