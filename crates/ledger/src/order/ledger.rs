//! Order ledger service.

use std::time::Instant;

use chrono::Utc;
use common::{ActorId, OrderId};
use doc_store::{DocumentKey, DocumentQuery, DocumentStore};
use tracing::{info, warn};

use super::{Order, OrderStatus};
use crate::cart::owner_lines;
use crate::error::{LedgerError, Result};
use crate::normalize::BuyerProfile;
use crate::pipeline::{Pipeline, USER_DATA};
use crate::sales;
use crate::stock::{Reservation, StockLocation};
use crate::transaction::{RetryPolicy, Transaction, with_retry};

fn partition(pipeline: Pipeline, status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => pipeline.pending_orders(),
        OrderStatus::Confirmed => pipeline.confirmed_orders(),
        OrderStatus::Cancelled => pipeline.cancelled_orders(),
    }
}

fn order_key(pipeline: Pipeline, status: OrderStatus, order_id: OrderId) -> DocumentKey {
    DocumentKey::new(partition(pipeline, status), order_id.to_string())
}

/// Records checkouts and drives orders through their state machine.
///
/// Each state has its own partition. Settling an order deletes the pending
/// document under its observed version and inserts the terminal copy under
/// an absent precondition, so the pending version acts as an idempotency
/// token: a replayed confirm or cancel finds the terminal copy and fails
/// with `AlreadyTerminal` without touching stock or sales.
pub struct OrderLedger<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> OrderLedger<S> {
    /// Creates an order ledger over `store`.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Converts the owner's cart into a pending order and clears the cart.
    ///
    /// Stock reserved by the cart lines carries over to the order. Pipelines
    /// with a checkout stock re-validate and decrement it for every line; a
    /// single short line aborts the whole checkout.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, pipeline: Pipeline, owner: &ActorId) -> Result<Order> {
        let started = Instant::now();
        let store = &self.store;

        let order = with_retry(&self.retry, "checkout", move || async move {
            let mut tx = Transaction::new(store);
            let lines = owner_lines(&mut tx, pipeline, owner).await?;
            if lines.is_empty() {
                return Err(LedgerError::EmptyCart {
                    owner_id: owner.clone(),
                });
            }

            if let Some(checkout_stock) = StockLocation::checkout(pipeline) {
                for line in &lines {
                    checkout_stock
                        .reserve(
                            &mut tx,
                            &line.catalog_item_id,
                            Reservation::Exact(line.quantity),
                        )
                        .await?;
                }
            }

            let order = Order::pending(pipeline, owner.clone(), &lines)?;
            tx.insert(order_key(pipeline, OrderStatus::Pending, order.id), &order)?;
            for line in &lines {
                tx.delete(DocumentKey::new(pipeline.cart(), line.id.as_str()));
            }
            tx.commit().await?;
            Ok(order)
        })
        .await?;

        metrics::histogram!("ledger_checkout_duration_seconds", "pipeline" => pipeline.as_str())
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("ledger_orders_created_total", "pipeline" => pipeline.as_str())
            .increment(1);
        info!(
            %pipeline,
            order_id = %order.id,
            owner = %owner,
            lines = order.line_items.len(),
            total = %order.total_amount,
            "order placed"
        );
        Ok(order)
    }

    /// Confirms a pending order.
    ///
    /// Moves it to the confirmed partition with the buyer's profile attached
    /// and increments the sales aggregates in the same batch.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, pipeline: Pipeline, order_id: OrderId) -> Result<Order> {
        let store = &self.store;

        let order = with_retry(&self.retry, "confirm_order", move || async move {
            let mut tx = Transaction::new(store);
            let pending = Self::load_pending(&mut tx, pipeline, order_id).await?;
            pending.status.ensure_transition(order_id, OrderStatus::Confirmed)?;

            let profile = Self::buyer_profile(store, &pending.buyer_id).await;
            let confirmed = Order {
                status: OrderStatus::Confirmed,
                confirmed_at: Some(Utc::now()),
                buyer_name: Some(profile.display_name),
                buyer_address: Some(profile.address),
                ..pending
            };

            tx.delete(order_key(pipeline, OrderStatus::Pending, order_id));
            tx.insert(order_key(pipeline, OrderStatus::Confirmed, order_id), &confirmed)?;
            sales::record_confirmed_order(&mut tx, &confirmed).await?;

            if pipeline.placeholder_on_confirm() {
                let catalog = StockLocation::catalog(pipeline);
                for line in &confirmed.line_items {
                    catalog.ensure_placeholder(&mut tx, line.restock()).await?;
                }
            }

            tx.commit().await?;
            Ok(confirmed)
        })
        .await?;

        metrics::counter!("ledger_orders_confirmed_total", "pipeline" => pipeline.as_str())
            .increment(1);
        metrics::counter!("ledger_revenue_cents_total", "pipeline" => pipeline.as_str())
            .increment(order.total_amount.cents().max(0) as u64);
        info!(%pipeline, order_id = %order_id, total = %order.total_amount, "order confirmed");
        Ok(order)
    }

    /// Cancels a pending order and returns its quantities to stock.
    ///
    /// Every line goes back to the catalog and, where the pipeline has one,
    /// to the checkout stock. Missing stock documents are recreated.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, pipeline: Pipeline, order_id: OrderId) -> Result<Order> {
        let store = &self.store;

        let order = with_retry(&self.retry, "cancel_order", move || async move {
            let mut tx = Transaction::new(store);
            let pending = Self::load_pending(&mut tx, pipeline, order_id).await?;
            pending.status.ensure_transition(order_id, OrderStatus::Cancelled)?;

            let locations = std::iter::once(StockLocation::catalog(pipeline))
                .chain(StockLocation::checkout(pipeline));
            for location in locations {
                for line in &pending.line_items {
                    location.restore(&mut tx, line.restock()).await?;
                }
            }

            let cancelled = Order {
                status: OrderStatus::Cancelled,
                cancelled_at: Some(Utc::now()),
                ..pending
            };
            tx.delete(order_key(pipeline, OrderStatus::Pending, order_id));
            tx.insert(order_key(pipeline, OrderStatus::Cancelled, order_id), &cancelled)?;
            tx.commit().await?;
            Ok(cancelled)
        })
        .await?;

        metrics::counter!("ledger_orders_cancelled_total", "pipeline" => pipeline.as_str())
            .increment(1);
        info!(%pipeline, order_id = %order_id, units = order.total_units(), "order cancelled");
        Ok(order)
    }

    /// Finds an order in any partition.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, pipeline: Pipeline, order_id: OrderId) -> Result<Order> {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
        ] {
            if let Some(document) = self.store.get(&order_key(pipeline, status, order_id)).await? {
                return Order::from_document(&document);
            }
        }
        Err(LedgerError::not_found("order", order_id))
    }

    /// Lists orders, oldest first, optionally narrowed to one status and one buyer.
    ///
    /// Documents that cannot be read are skipped with a warning.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        pipeline: Pipeline,
        status: Option<OrderStatus>,
        buyer: Option<&ActorId>,
    ) -> Result<Vec<Order>> {
        let statuses = match status {
            Some(status) => vec![status],
            None => vec![
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Cancelled,
            ],
        };

        let mut orders = Vec::new();
        for status in statuses {
            let mut query = DocumentQuery::collection(partition(pipeline, status));
            if let Some(buyer) = buyer {
                query = query.field_eq("buyer_id", buyer.as_str());
            }
            for document in self.store.query(query).await? {
                match Order::from_document(&document) {
                    Ok(order) => orders.push(order),
                    Err(e) => warn!(key = %document.key, error = %e, "skipping unreadable order"),
                }
            }
        }

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    /// Loads the pending copy of an order, reporting `AlreadyTerminal` when
    /// only a settled copy exists.
    async fn load_pending(
        tx: &mut Transaction<'_, S>,
        pipeline: Pipeline,
        order_id: OrderId,
    ) -> Result<Order> {
        if let Some(document) = tx
            .get(&order_key(pipeline, OrderStatus::Pending, order_id))
            .await?
        {
            return Order::from_document(&document);
        }

        for status in [OrderStatus::Confirmed, OrderStatus::Cancelled] {
            if tx.get(&order_key(pipeline, status, order_id)).await?.is_some() {
                return Err(LedgerError::AlreadyTerminal { order_id, status });
            }
        }
        Err(LedgerError::not_found("order", order_id))
    }

    /// Resolves the buyer's display details; read-only and never fails.
    async fn buyer_profile(store: &S, buyer: &ActorId) -> BuyerProfile {
        match store.get(&DocumentKey::new(USER_DATA, buyer.as_str())).await {
            Ok(Some(document)) => BuyerProfile::from_document(&document),
            Ok(None) => BuyerProfile::unknown(),
            Err(e) => {
                warn!(buyer = %buyer, error = %e, "buyer profile unavailable");
                BuyerProfile::unknown()
            }
        }
    }
}
