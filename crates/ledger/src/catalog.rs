//! Catalog store: sellable plants and materials with their stock on hand.

use common::ItemId;
use doc_store::{DocumentKey, DocumentQuery, DocumentStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::normalize;
use crate::pipeline::{GROWTH_RECORDS, Pipeline};
use crate::stock::{StockLocation, add_stock};
use crate::transaction::{RetryPolicy, Transaction, with_retry};

/// A sellable plant or material record.
///
/// Field names match the canonical stored form; anything else found on the
/// stored document is kept in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    #[serde(rename = "quantity")]
    pub quantity_on_hand: u32,
    pub category: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl CatalogItem {
    /// Returns true if at least one unit is on hand.
    pub fn in_stock(&self) -> bool {
        self.quantity_on_hand > 0
    }
}

/// Input for listing a new item or replacing an existing listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCatalogItem {
    /// Id to list under; a new one is generated when absent.
    #[serde(default)]
    pub id: Option<ItemId>,
    pub name: String,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Filter for [`CatalogStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub in_stock_only: bool,
}

impl CatalogFilter {
    fn accepts(&self, item: &CatalogItem) -> bool {
        self.category.as_deref().is_none_or(|c| item.category == c)
            && (!self.in_stock_only || item.in_stock())
    }
}

/// Reads and writes catalog items.
///
/// This is the single source of truth for sellable quantity: every read of
/// stock goes to the store, nothing is cached past one transaction.
pub struct CatalogStore<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CatalogStore<S> {
    /// Creates a catalog store over `store`.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Returns one item or `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, pipeline: Pipeline, id: &ItemId) -> Result<CatalogItem> {
        let key = DocumentKey::new(pipeline.catalog(), id.as_str());
        let document = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| LedgerError::not_found("catalog item", id))?;
        normalize::catalog_item(pipeline, &document)
    }

    /// Lists items in id order.
    ///
    /// Documents that cannot be normalized are skipped with a warning.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        pipeline: Pipeline,
        filter: &CatalogFilter,
    ) -> Result<Vec<CatalogItem>> {
        let documents = self
            .store
            .query(DocumentQuery::collection(pipeline.catalog()))
            .await?;

        Ok(documents
            .iter()
            .filter_map(|document| match normalize::catalog_item(pipeline, document) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(key = %document.key, error = %e, "skipping unreadable catalog item");
                    None
                }
            })
            .filter(|item| filter.accepts(item))
            .collect())
    }

    /// Applies a signed delta to an item's stock and returns the new catalog
    /// quantity.
    ///
    /// Pipelines with a checkout stock receive the same delta in the same
    /// transaction; a missing checkout document is recreated from the
    /// adjusted listing.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&self, pipeline: Pipeline, id: &ItemId, delta: i64) -> Result<u32> {
        let location = StockLocation::catalog(pipeline);
        let store = &self.store;

        let quantity = with_retry(&self.retry, "adjust_stock", move || async move {
            let mut tx = Transaction::new(store);
            let quantity = location.adjust(&mut tx, id, delta).await?;
            if let Some(checkout) = StockLocation::checkout(pipeline)
                && delta != 0
            {
                if checkout.load(&mut tx, id).await?.is_some() {
                    checkout.adjust(&mut tx, id, delta).await?;
                } else {
                    let listing = location.require(&mut tx, id).await?;
                    checkout.store(&mut tx, &listing)?;
                }
            }
            tx.commit().await?;
            Ok(quantity)
        })
        .await?;

        info!(%pipeline, item_id = %id, delta, quantity, "stock adjusted");
        Ok(quantity)
    }

    /// Creates or replaces a listing.
    ///
    /// Materials are also written to the pipeline's checkout stock so that
    /// orders for them can be fulfilled.
    #[tracing::instrument(skip(self, item), fields(name = %item.name))]
    pub async fn list_item(&self, pipeline: Pipeline, item: NewCatalogItem) -> Result<CatalogItem> {
        let name = item.name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("name must not be empty".to_string()));
        }
        item.unit_price.validate_unit_price()?;

        let listed = CatalogItem {
            id: item
                .id
                .unwrap_or_else(|| ItemId::new(uuid::Uuid::new_v4().to_string())),
            name: name.to_string(),
            unit_price: item.unit_price,
            quantity_on_hand: item.quantity,
            category: item
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| pipeline.default_category().to_string()),
            metadata: item.metadata,
        };

        let store = &self.store;
        let listed_ref = &listed;
        with_retry(&self.retry, "list_item", move || async move {
            let mut tx = Transaction::new(store);
            StockLocation::catalog(pipeline).store(&mut tx, listed_ref)?;
            if let Some(checkout) = StockLocation::checkout(pipeline) {
                checkout.store(&mut tx, listed_ref)?;
            }
            tx.commit().await?;
            Ok(())
        })
        .await?;

        info!(%pipeline, item_id = %listed.id, quantity = listed.quantity_on_hand, "item listed");
        Ok(listed)
    }

    /// Moves a grown plant into the sellable inventory.
    ///
    /// Deletes the growth record and creates the inventory item (or adds to
    /// its stock if it already exists) in one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn promote_plant(
        &self,
        record_id: &str,
        quantity: u32,
        unit_price: Money,
    ) -> Result<CatalogItem> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }
        unit_price.validate_unit_price()?;

        let store = &self.store;
        let item = with_retry(&self.retry, "promote_plant", move || async move {
            let mut tx = Transaction::new(store);
            let record_key = DocumentKey::new(GROWTH_RECORDS, record_id);
            let record = tx
                .get(&record_key)
                .await?
                .ok_or_else(|| LedgerError::not_found("growth record", record_id))?;

            let location = StockLocation::catalog(Pipeline::Plant);
            let item_id = ItemId::new(record_id);
            let item = match location.load(&mut tx, &item_id).await? {
                Some(mut existing) => {
                    existing.quantity_on_hand =
                        add_stock(&existing.id, existing.quantity_on_hand, quantity)?;
                    existing.unit_price = unit_price;
                    existing
                }
                None => {
                    let mut grown = normalize::catalog_item(Pipeline::Plant, &record)?;
                    grown.quantity_on_hand = quantity;
                    grown.unit_price = unit_price;
                    grown
                }
            };

            location.store(&mut tx, &item)?;
            tx.delete(record_key);
            tx.commit().await?;
            Ok(item)
        })
        .await?;

        info!(record_id, item_id = %item.id, quantity, "plant promoted to inventory");
        Ok(item)
    }
}
