//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use doc_store::{DocumentKey, DocumentStoreExt, InMemoryDocumentStore};
use ledger::LedgerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryDocumentStore) {
    let store = InMemoryDocumentStore::new();
    let state = api::create_default_state(store.clone(), LedgerConfig::default());
    (api::create_app(state, get_metrics_handle()), store)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn add_line(app: &axum::Router, owner: &str, item_id: &str) -> (StatusCode, Value) {
    let uri = format!("/carts/plants/{owner}/lines");
    post(app, &uri, json!({ "item_id": item_id })).await
}

async fn seed_plant(store: &InMemoryDocumentStore, id: &str, quantity: u32) {
    store
        .put_unchecked(
            DocumentKey::new("inventory", id),
            &json!({"name": "Fern", "unit_price_cents": 1000, "quantity": quantity}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_and_get_catalog() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 3).await;
    seed_plant(&store, "p2", 0).await;

    let (status, json) = send(&app, "GET", "/catalog/plants?in_stock=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], "p1");

    let (status, json) = send(&app, "GET", "/catalog/plants/p2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 0);

    let (status, _) = send(&app, "GET", "/catalog/plants/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, "GET", "/catalog/seeds", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("seeds"));
}

#[tokio::test]
async fn test_list_item_accepts_form_strings() {
    let (app, _) = setup();
    let (status, json) = send(
        &app,
        "POST",
        "/catalog/materials",
        Some(json!({"id": "m1", "name": "Peat", "unit_price": "12.50", "quantity": "7"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["unit_price_cents"], 1250);
    assert_eq!(json["quantity"], 7);
    assert_eq!(json["category"], "material");
}

#[tokio::test]
async fn test_adjust_stock() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 2).await;

    let (status, json) = post(&app, "/catalog/plants/p1/adjust", json!({"delta": 3})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 5);

    let (status, _) = post(&app, "/catalog/plants/p1/adjust", json!({"delta": -9})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_promote_growth_record() {
    let (app, store) = setup();
    store
        .put_unchecked(
            DocumentKey::new("plant_growth", "g1"),
            &json!({"common_name": "Monstera"}),
        )
        .await
        .unwrap();

    let (status, json) = send(
        &app,
        "POST",
        "/growth/g1/promote",
        Some(json!({"quantity": 4, "unit_price": 25})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["name"], "Monstera");
    assert_eq!(json["unit_price_cents"], 2500);

    let body = json!({"quantity": 1, "unit_price": 1});
    let (status, _) = post(&app, "/growth/g1/promote", body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_reservation_flow() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 1).await;

    let (status, line) = add_line(&app, "a", "p1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(line["quantity"], 1);

    let (status, _) = add_line(&app, "b", "p1").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = add_line(&app, "a", "p1").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, view) = send(&app, "GET", "/carts/plants/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["lines"][0]["available"], 0);
    assert_eq!(view["subtotal_cents"], 1000);

    let line_uri = format!("/carts/plants/a/lines/{}", line["id"].as_str().unwrap());
    let (status, _) = send(&app, "DELETE", &line_uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, item) = send(&app, "GET", "/catalog/plants/p1", None).await;
    assert_eq!(item["quantity"], 1);

    let (status, _) = send(&app, "DELETE", &line_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_line_quantity() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 5).await;

    let (_, line) = add_line(&app, "a", "p1").await;
    let uri = format!("/carts/plants/a/lines/{}", line["id"].as_str().unwrap());

    let (status, updated) = send(&app, "PATCH", &uri, Some(json!({"quantity": "3"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], 3);

    let (status, _) = send(&app, "PATCH", &uri, Some(json!({"quantity": -1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_confirm_and_sales() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 5).await;

    let (_, line) = add_line(&app, "u1", "p1").await;
    let uri = format!("/carts/plants/u1/lines/{}", line["id"].as_str().unwrap());
    send(&app, "PATCH", &uri, Some(json!({"quantity": 2}))).await;

    let (status, order) = send(&app, "POST", "/carts/plants/u1/checkout", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount_cents"], 2000);
    let order_id = order["id"].as_str().unwrap();

    let confirm_uri = format!("/orders/plants/{order_id}/confirm");
    let (status, confirmed) = send(&app, "POST", &confirm_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["buyer_name"], "Unknown");

    let (status, _) = send(&app, "POST", &confirm_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, summary) = send(&app, "GET", "/sales/plants/summary", None).await;
    assert_eq!(summary["total_revenue_cents"], 2000);
    assert_eq!(summary["total_orders_confirmed"], 1);

    let (_, products) = send(&app, "GET", "/sales/plants/products?by=units&limit=5", None).await;
    assert_eq!(products[0]["product_id"], "p1");
    assert_eq!(products[0]["units_sold"], 2);

    let (_, orders) = send(&app, "GET", "/orders/plants?status=confirmed&buyer=u1", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 2).await;

    add_line(&app, "u1", "p1").await;
    let (_, order) = send(&app, "POST", "/carts/plants/u1/checkout", None).await;
    let order_id = order["id"].as_str().unwrap();

    let cancel_uri = format!("/orders/plants/{order_id}/cancel");
    let (status, cancelled) = send(&app, "POST", &cancel_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, item) = send(&app, "GET", "/catalog/plants/p1", None).await;
    assert_eq!(item["quantity"], 2);

    let (status, fetched) = send(&app, "GET", &format!("/orders/plants/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "cancelled");
}

#[tokio::test]
async fn test_checkout_empty_cart_is_bad_request() {
    let (app, _) = setup();
    let (status, json) = send(&app, "POST", "/carts/plants/nobody/checkout", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_order_id_must_be_uuid() {
    let (app, _) = setup();
    let (status, _) = send(&app, "GET", "/orders/plants/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/orders/plants?status=shipped", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_cart() {
    let (app, store) = setup();
    seed_plant(&store, "p1", 2).await;
    add_line(&app, "u1", "p1").await;

    let (status, json) = send(&app, "DELETE", "/carts/plants/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);
}
