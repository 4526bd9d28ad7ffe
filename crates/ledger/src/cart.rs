//! Cart aggregator: per-actor lines that hold a stock reservation.

use chrono::{DateTime, Utc};
use common::{ActorId, ItemId, LineId};
use doc_store::{Document, DocumentKey, DocumentQuery, DocumentStore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::normalize;
use crate::pipeline::{Pipeline, ReservationPolicy};
use crate::stock::{Reservation, Restock, StockLocation};
use crate::transaction::{RetryPolicy, Transaction, with_retry};

/// A pending reservation of one catalog item by one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub owner_id: ActorId,
    pub pipeline: Pipeline,
    pub catalog_item_id: ItemId,
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(deserialize_with = "normalize::quantity")]
    pub quantity: u32,
    /// Price at the time the line was added.
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    /// Upper bound for quantity changes, set when the whole stock was reserved.
    #[serde(default)]
    pub max_quantity: Option<u32>,
    pub added_at: DateTime<Utc>,
}

fn unknown_name() -> String {
    normalize::UNKNOWN_NAME.to_string()
}

impl CartLine {
    /// Returns quantity × snapshot price.
    pub fn line_total(&self) -> Result<Money> {
        self.unit_price.multiply(self.quantity)
    }

    /// Clamps a requested quantity to what this line allows.
    pub fn clamp_quantity(&self, requested: u32) -> u32 {
        let quantity = requested.max(1);
        match self.max_quantity {
            Some(max) => quantity.min(max.max(1)),
            None => quantity,
        }
    }

    pub(crate) fn restock(&self) -> Restock<'_> {
        Restock {
            item_id: &self.catalog_item_id,
            name: &self.name,
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }

    pub(crate) fn from_document(document: &Document) -> Result<Self> {
        serde_json::from_value(document.body.clone()).map_err(|e| LedgerError::InvalidDocument {
            key: document.key.clone(),
            reason: e.to_string(),
        })
    }
}

/// A cart line together with live catalog availability.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    /// Units still on hand in the catalog, 0 if the item is gone.
    pub available: u32,
    #[serde(rename = "line_total_cents")]
    pub line_total: Money,
}

/// An actor's cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub owner_id: ActorId,
    pub pipeline: Pipeline,
    pub lines: Vec<CartLineView>,
    #[serde(rename = "subtotal_cents")]
    pub subtotal: Money,
}

fn line_key(pipeline: Pipeline, line_id: &LineId) -> DocumentKey {
    DocumentKey::new(pipeline.cart(), line_id.as_str())
}

fn owner_query(pipeline: Pipeline, owner: &ActorId) -> DocumentQuery {
    DocumentQuery::collection(pipeline.cart()).field_eq("owner_id", owner.as_str())
}

/// Reads an actor's lines inside a transaction.
pub(crate) async fn owner_lines<S>(
    tx: &mut Transaction<'_, S>,
    pipeline: Pipeline,
    owner: &ActorId,
) -> Result<Vec<CartLine>>
where
    S: DocumentStore + ?Sized,
{
    tx.query(owner_query(pipeline, owner))
        .await?
        .iter()
        .map(CartLine::from_document)
        .collect()
}

/// Loads a line that must belong to `owner`.
async fn owned_line<S>(
    tx: &mut Transaction<'_, S>,
    pipeline: Pipeline,
    owner: &ActorId,
    line_id: &LineId,
) -> Result<CartLine>
where
    S: DocumentStore + ?Sized,
{
    let line = match tx.get(&line_key(pipeline, line_id)).await? {
        Some(document) => CartLine::from_document(&document)?,
        None => return Err(LedgerError::not_found("cart line", line_id)),
    };
    if &line.owner_id != owner {
        return Err(LedgerError::not_found("cart line", line_id));
    }
    Ok(line)
}

/// Manages cart lines and the stock they reserve.
pub struct CartAggregator<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CartAggregator<S> {
    /// Creates a cart aggregator over `store`.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Adds an item to the owner's cart, reserving stock in the same transaction.
    ///
    /// Buyers reserve one unit; workers reserve the item's entire stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        pipeline: Pipeline,
        owner: &ActorId,
        item_id: &ItemId,
    ) -> Result<CartLine> {
        let store = &self.store;

        let line = with_retry(&self.retry, "add_line", move || async move {
            let mut tx = Transaction::new(store);

            let duplicate = || LedgerError::DuplicateLine {
                owner_id: owner.clone(),
                item_id: item_id.clone(),
            };
            let line_id = LineId::for_owner_item(owner, item_id);
            if tx.get(&line_key(pipeline, &line_id)).await?.is_some() {
                return Err(duplicate());
            }
            if owner_lines(&mut tx, pipeline, owner)
                .await?
                .iter()
                .any(|line| &line.catalog_item_id == item_id)
            {
                return Err(duplicate());
            }

            let policy = pipeline.reservation();
            let (item, reserved) = StockLocation::catalog(pipeline)
                .reserve(&mut tx, item_id, Reservation::Policy(policy))
                .await?;
            item.unit_price.multiply(reserved)?;

            let line = CartLine {
                id: line_id.clone(),
                owner_id: owner.clone(),
                pipeline,
                catalog_item_id: item_id.clone(),
                name: item.name,
                quantity: reserved,
                unit_price: item.unit_price,
                max_quantity: match policy {
                    ReservationPolicy::Unit => None,
                    ReservationPolicy::WholeStock => Some(item.quantity_on_hand),
                },
                added_at: Utc::now(),
            };
            tx.insert(line_key(pipeline, &line_id), &line)?;
            tx.commit().await?;
            Ok(line)
        })
        .await?;

        info!(
            %pipeline,
            owner = %owner,
            item_id = %item_id,
            quantity = line.quantity,
            "line added"
        );
        Ok(line)
    }

    /// Changes a line's quantity and moves the difference to or from the catalog.
    ///
    /// The requested quantity is clamped to at least 1 and, for lines that
    /// reserved a whole stock, to the quantity seen when the line was added.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        pipeline: Pipeline,
        owner: &ActorId,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<CartLine> {
        let store = &self.store;

        let line = with_retry(&self.retry, "update_quantity", move || async move {
            let mut tx = Transaction::new(store);
            let mut line = owned_line(&mut tx, pipeline, owner, line_id).await?;

            let target = line.clamp_quantity(quantity);
            if target == line.quantity {
                return Ok(line);
            }
            line.unit_price.multiply(target)?;

            let catalog = StockLocation::catalog(pipeline);
            if target > line.quantity {
                catalog
                    .reserve(
                        &mut tx,
                        &line.catalog_item_id,
                        Reservation::Exact(target - line.quantity),
                    )
                    .await?;
            } else {
                let mut released = line.restock();
                released.quantity = line.quantity - target;
                catalog.restore(&mut tx, released).await?;
            }

            line.quantity = target;
            tx.put(line_key(pipeline, line_id), &line)?;
            tx.commit().await?;
            Ok(line)
        })
        .await?;

        info!(%pipeline, line_id = %line_id, quantity = line.quantity, "line quantity updated");
        Ok(line)
    }

    /// Removes a line and returns its quantity to the catalog atomically.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        pipeline: Pipeline,
        owner: &ActorId,
        line_id: &LineId,
    ) -> Result<CartLine> {
        let store = &self.store;

        let line = with_retry(&self.retry, "remove_line", move || async move {
            let mut tx = Transaction::new(store);
            let line = owned_line(&mut tx, pipeline, owner, line_id).await?;

            StockLocation::catalog(pipeline)
                .restore(&mut tx, line.restock())
                .await?;
            tx.delete(line_key(pipeline, line_id));
            tx.commit().await?;
            Ok(line)
        })
        .await?;

        info!(%pipeline, line_id = %line_id, restored = line.quantity, "line removed");
        Ok(line)
    }

    /// Deletes every line of the owner without restoring stock.
    ///
    /// Returns the number of lines removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, pipeline: Pipeline, owner: &ActorId) -> Result<usize> {
        let store = &self.store;

        with_retry(&self.retry, "clear_cart", move || async move {
            let mut tx = Transaction::new(store);
            let lines = owner_lines(&mut tx, pipeline, owner).await?;
            for line in &lines {
                tx.delete(line_key(pipeline, &line.id));
            }
            tx.commit().await?;
            Ok(lines.len())
        })
        .await
    }

    /// Returns the owner's lines in id order.
    pub async fn lines(&self, pipeline: Pipeline, owner: &ActorId) -> Result<Vec<CartLine>> {
        self.store
            .query(owner_query(pipeline, owner))
            .await?
            .iter()
            .map(CartLine::from_document)
            .collect()
    }

    /// Returns the owner's cart with live availability and subtotal.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, pipeline: Pipeline, owner: &ActorId) -> Result<CartView> {
        let mut lines = Vec::new();
        for line in self.lines(pipeline, owner).await? {
            let key = DocumentKey::new(pipeline.catalog(), line.catalog_item_id.as_str());
            let available = match self.store.get(&key).await? {
                Some(document) => normalize::catalog_item(pipeline, &document)?.quantity_on_hand,
                None => 0,
            };
            lines.push(CartLineView {
                line_total: line.line_total()?,
                available,
                line,
            });
        }

        Ok(CartView {
            owner_id: owner.clone(),
            pipeline,
            subtotal: Money::try_sum(lines.iter().map(|l| l.line_total))?,
            lines,
        })
    }
}
