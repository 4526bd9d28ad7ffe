//! Stock reservation engine.
//!
//! Every change to a quantity on hand goes through a [`StockLocation`]
//! inside a [`Transaction`], so the read, the validation and the write of
//! the new quantity commit together with whatever triggered them (a cart
//! line, an order, a cancellation). Quantities never go below zero.

use doc_store::{DocumentKey, DocumentStore};
use serde_json::Map;
use tracing::debug;

use crate::catalog::CatalogItem;
use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::normalize;
use crate::pipeline::{Pipeline, ReservationPolicy};
use crate::transaction::Transaction;
use common::ItemId;

/// Adds units to a quantity on hand, failing with `InsufficientStock`
/// rather than capping when the result does not fit.
pub(crate) fn add_stock(item_id: &ItemId, on_hand: u32, quantity: u32) -> Result<u32> {
    on_hand
        .checked_add(quantity)
        .ok_or_else(|| LedgerError::InsufficientStock {
            item_id: item_id.clone(),
            on_hand,
            delta: i64::from(quantity),
        })
}

/// How much stock a reservation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Follow the pipeline's cart policy.
    Policy(ReservationPolicy),
    /// Take exactly this many units.
    Exact(u32),
}

/// Snapshot of an item taken when restoring stock, used to recreate it if
/// the stock document has since been removed.
#[derive(Debug, Clone)]
pub struct Restock<'a> {
    pub item_id: &'a ItemId,
    pub name: &'a str,
    pub unit_price: Money,
    pub quantity: u32,
}

/// A collection holding stock documents for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLocation {
    pipeline: Pipeline,
    collection: &'static str,
}

impl StockLocation {
    /// The pipeline's sellable catalog.
    pub fn catalog(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            collection: pipeline.catalog(),
        }
    }

    /// The stock re-validated at checkout, if the pipeline has one.
    pub fn checkout(pipeline: Pipeline) -> Option<Self> {
        pipeline
            .checkout_stock()
            .map(|collection| Self { pipeline, collection })
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn key(&self, item_id: &ItemId) -> DocumentKey {
        DocumentKey::new(self.collection, item_id.as_str())
    }

    /// Loads and normalizes an item, if present.
    pub async fn load<S>(
        &self,
        tx: &mut Transaction<'_, S>,
        item_id: &ItemId,
    ) -> Result<Option<CatalogItem>>
    where
        S: DocumentStore + ?Sized,
    {
        match tx.get(&self.key(item_id)).await? {
            Some(document) => Ok(Some(normalize::catalog_item(self.pipeline, &document)?)),
            None => Ok(None),
        }
    }

    /// Loads an item or fails with `NotFound`.
    pub async fn require<S>(
        &self,
        tx: &mut Transaction<'_, S>,
        item_id: &ItemId,
    ) -> Result<CatalogItem>
    where
        S: DocumentStore + ?Sized,
    {
        self.load(tx, item_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("catalog item", item_id))
    }

    /// Stages a write of `item` in this location.
    pub fn store<S>(&self, tx: &mut Transaction<'_, S>, item: &CatalogItem) -> Result<()>
    where
        S: DocumentStore + ?Sized,
    {
        tx.put(self.key(&item.id), item)
    }

    /// Decrements stock for a reservation and returns the item as it was
    /// before, together with the number of units taken.
    ///
    /// Fails with `OutOfStock` when nothing is on hand or fewer units than
    /// requested remain.
    pub async fn reserve<S>(
        &self,
        tx: &mut Transaction<'_, S>,
        item_id: &ItemId,
        reservation: Reservation,
    ) -> Result<(CatalogItem, u32)>
    where
        S: DocumentStore + ?Sized,
    {
        let item = self.require(tx, item_id).await?;
        let available = item.quantity_on_hand;

        let requested = match reservation {
            Reservation::Policy(ReservationPolicy::Unit) => 1,
            Reservation::Policy(ReservationPolicy::WholeStock) => available.max(1),
            Reservation::Exact(quantity) => quantity,
        };

        if requested == 0 {
            return Err(LedgerError::InvalidQuantity { quantity: 0 });
        }
        if available == 0 || requested > available {
            return Err(LedgerError::OutOfStock {
                item_id: item_id.clone(),
                requested,
                available,
            });
        }

        let mut updated = item.clone();
        updated.quantity_on_hand = available - requested;
        self.store(tx, &updated)?;

        metrics::counter!("ledger_reservations_total", "collection" => self.collection)
            .increment(1);
        debug!(
            collection = self.collection,
            item_id = %item_id,
            reserved = requested,
            remaining = updated.quantity_on_hand,
            "stock reserved"
        );

        Ok((item, requested))
    }

    /// Adds stock back, recreating the item from `restock` if it no longer exists.
    ///
    /// Returns the new quantity on hand.
    pub async fn restore<S>(&self, tx: &mut Transaction<'_, S>, restock: Restock<'_>) -> Result<u32>
    where
        S: DocumentStore + ?Sized,
    {
        let item = match self.load(tx, restock.item_id).await? {
            Some(mut item) => {
                item.quantity_on_hand =
                    add_stock(restock.item_id, item.quantity_on_hand, restock.quantity)?;
                item
            }
            None => {
                debug!(
                    collection = self.collection,
                    item_id = %restock.item_id,
                    "recreating missing stock document"
                );
                self.placeholder(&restock, restock.quantity)
            }
        };
        self.store(tx, &item)?;
        Ok(item.quantity_on_hand)
    }

    /// Applies a signed delta to the quantity on hand.
    ///
    /// Fails with `NotFound` for an unknown item and `InsufficientStock` when
    /// the result would be negative.
    pub async fn adjust<S>(
        &self,
        tx: &mut Transaction<'_, S>,
        item_id: &ItemId,
        delta: i64,
    ) -> Result<u32>
    where
        S: DocumentStore + ?Sized,
    {
        let mut item = self.require(tx, item_id).await?;
        let on_hand = item.quantity_on_hand;
        let insufficient = || LedgerError::InsufficientStock {
            item_id: item_id.clone(),
            on_hand,
            delta,
        };

        let updated = i64::from(on_hand)
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| insufficient())?;
        item.quantity_on_hand = u32::try_from(updated).map_err(|_| insufficient())?;

        if delta != 0 {
            self.store(tx, &item)?;
        }
        Ok(item.quantity_on_hand)
    }

    /// Creates a zero-stock item if none exists. Returns true if one was created.
    pub async fn ensure_placeholder<S>(
        &self,
        tx: &mut Transaction<'_, S>,
        restock: Restock<'_>,
    ) -> Result<bool>
    where
        S: DocumentStore + ?Sized,
    {
        if tx.get(&self.key(restock.item_id)).await?.is_some() {
            return Ok(false);
        }
        let placeholder = self.placeholder(&restock, 0);
        tx.insert(self.key(&placeholder.id), &placeholder)?;
        Ok(true)
    }

    fn placeholder(&self, restock: &Restock<'_>, quantity: u32) -> CatalogItem {
        CatalogItem {
            id: restock.item_id.clone(),
            name: restock.name.to_string(),
            unit_price: restock.unit_price,
            quantity_on_hand: quantity,
            category: self.pipeline.default_category().to_string(),
            metadata: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_store::{DocumentStoreExt, InMemoryDocumentStore};
    use serde_json::json;

    async fn seeded(quantity: serde_json::Value) -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .put_unchecked(
                DocumentKey::new("inventory", "p1"),
                &json!({"name": "Fern", "unit_price": "10.00", "quantity": quantity}),
            )
            .await
            .unwrap();
        store
    }

    async fn on_hand(store: &InMemoryDocumentStore, collection: &str) -> serde_json::Value {
        store
            .get(&DocumentKey::new(collection, "p1"))
            .await
            .unwrap()
            .map(|d| d.body["quantity"].clone())
            .unwrap_or(serde_json::Value::Null)
    }

    #[tokio::test]
    async fn unit_reservation_takes_one() {
        let store = seeded(json!(3)).await;
        let location = StockLocation::catalog(Pipeline::Plant);
        let item_id = ItemId::new("p1");

        let mut tx = Transaction::new(&store);
        let (before, taken) = location
            .reserve(&mut tx, &item_id, Reservation::Policy(ReservationPolicy::Unit))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(before.quantity_on_hand, 3);
        assert_eq!(taken, 1);
        assert_eq!(on_hand(&store, "inventory").await, json!(2));
    }

    #[tokio::test]
    async fn whole_stock_reservation_takes_everything() {
        let store = seeded(json!("7")).await;
        let location = StockLocation::catalog(Pipeline::Plant);

        let mut tx = Transaction::new(&store);
        let (_, taken) = location
            .reserve(
                &mut tx,
                &ItemId::new("p1"),
                Reservation::Policy(ReservationPolicy::WholeStock),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(taken, 7);
        assert_eq!(on_hand(&store, "inventory").await, json!(0));
    }

    #[tokio::test]
    async fn empty_stock_is_out_of_stock() {
        let store = seeded(json!(0)).await;
        let location = StockLocation::catalog(Pipeline::Plant);

        let mut tx = Transaction::new(&store);
        let result = location
            .reserve(&mut tx, &ItemId::new("p1"), Reservation::Exact(1))
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::OutOfStock { available: 0, requested: 1, .. })
        ));
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let location = StockLocation::catalog(Pipeline::Plant);

        let mut tx = Transaction::new(&store);
        let result = location
            .reserve(&mut tx, &ItemId::new("nope"), Reservation::Exact(1))
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn adjust_never_goes_negative() {
        let store = seeded(json!(2)).await;
        let location = StockLocation::catalog(Pipeline::Plant);
        let item_id = ItemId::new("p1");

        let mut tx = Transaction::new(&store);
        let result = location.adjust(&mut tx, &item_id, -3).await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientStock { on_hand: 2, delta: -3, .. })
        ));

        assert_eq!(location.adjust(&mut tx, &item_id, -2).await.unwrap(), 0);
        assert_eq!(location.adjust(&mut tx, &item_id, 5).await.unwrap(), 5);
        tx.commit().await.unwrap();
        assert_eq!(on_hand(&store, "inventory").await, json!(5));
    }

    #[tokio::test]
    async fn restore_recreates_missing_items() {
        let store = InMemoryDocumentStore::new();
        let location = StockLocation::checkout(Pipeline::Material).unwrap();
        let item_id = ItemId::new("p1");

        let mut tx = Transaction::new(&store);
        let quantity = location
            .restore(
                &mut tx,
                Restock {
                    item_id: &item_id,
                    name: "Peat",
                    unit_price: Money::from_cents(500),
                    quantity: 4,
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(quantity, 4);
        let doc = store
            .get(&DocumentKey::new("supplier_stock", "p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.body["name"], "Peat");
        assert_eq!(doc.body["unit_price_cents"], 500);
        assert_eq!(doc.body["category"], "material");
    }

    #[tokio::test]
    async fn placeholder_is_only_created_once() {
        let store = seeded(json!(3)).await;
        let location = StockLocation::catalog(Pipeline::Plant);
        fn restock(item_id: &ItemId) -> Restock<'_> {
            Restock {
                item_id,
                name: "Fern",
                unit_price: Money::from_cents(1000),
                quantity: 0,
            }
        }

        let existing = ItemId::new("p1");
        let missing = ItemId::new("p2");
        let mut tx = Transaction::new(&store);
        assert!(!location.ensure_placeholder(&mut tx, restock(&existing)).await.unwrap());
        assert!(location.ensure_placeholder(&mut tx, restock(&missing)).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(on_hand(&store, "inventory").await, json!(3));
        let placeholder = store
            .get(&DocumentKey::new("inventory", "p2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(placeholder.body["quantity"], 0);
    }
}
