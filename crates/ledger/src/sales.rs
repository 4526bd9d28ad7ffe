//! Sales aggregation: realized-sales counters written by order confirmation.
//!
//! Counters only ever grow. The write path is [`record_confirmed_order`],
//! staged in the same transaction that moves an order to confirmed; the
//! read path is [`SalesReport`], which degrades to zeroed defaults rather
//! than failing.

use chrono::{DateTime, Utc};
use common::ItemId;
use doc_store::{Document, DocumentKey, DocumentQuery, DocumentStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::normalize;
use crate::order::Order;
use crate::pipeline::Pipeline;
use crate::transaction::Transaction;

/// Per-product realized sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSales {
    pub product_id: ItemId,
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default, deserialize_with = "normalize::count")]
    pub units_sold: u64,
    #[serde(default, rename = "revenue_cents")]
    pub revenue: Money,
    #[serde(default)]
    pub last_sold_at: Option<DateTime<Utc>>,
}

fn unknown_name() -> String {
    normalize::UNKNOWN_NAME.to_string()
}

impl ProductSales {
    /// Zeroed counters for a product with no sales.
    pub fn empty(product_id: ItemId) -> Self {
        Self {
            product_id,
            name: unknown_name(),
            units_sold: 0,
            revenue: Money::zero(),
            last_sold_at: None,
        }
    }
}

/// Global realized-sales totals for one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    #[serde(default, rename = "total_revenue_cents")]
    pub total_revenue: Money,
    #[serde(default, deserialize_with = "normalize::count")]
    pub total_units_sold: u64,
    #[serde(default, deserialize_with = "normalize::count")]
    pub total_orders_confirmed: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Ordering for [`SalesReport::top_products`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesRanking {
    #[default]
    Revenue,
    Units,
}

fn decode<T: serde::de::DeserializeOwned>(document: &Document) -> Result<T> {
    serde_json::from_value(document.body.clone()).map_err(|e| LedgerError::InvalidDocument {
        key: document.key.clone(),
        reason: e.to_string(),
    })
}

/// Increments one product's counters and the global units and revenue,
/// creating either document on first sale.
///
/// Fails with `InvalidInput` if a counter would overflow.
pub async fn record_sale<S>(
    tx: &mut Transaction<'_, S>,
    pipeline: Pipeline,
    product_id: &ItemId,
    name: &str,
    units: u32,
    revenue: Money,
) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    let now = Utc::now();

    let product_key = DocumentKey::new(pipeline.product_sales(), product_id.as_str());
    let mut product = match tx.get(&product_key).await? {
        Some(document) => decode::<ProductSales>(&document)?,
        None => ProductSales::empty(product_id.clone()),
    };
    product.name = name.to_string();
    product.units_sold = add_units(product.units_sold, units)?;
    product.revenue = product.revenue.checked_add(revenue)?;
    product.last_sold_at = Some(now);
    tx.put(product_key, &product)?;

    let summary_key = pipeline.sales_summary();
    let mut summary = match tx.get(&summary_key).await? {
        Some(document) => decode::<SalesSummary>(&document)?,
        None => SalesSummary::default(),
    };
    summary.total_units_sold = add_units(summary.total_units_sold, units)?;
    summary.total_revenue = summary.total_revenue.checked_add(revenue)?;
    summary.last_updated = Some(now);
    tx.put(summary_key, &summary)?;

    Ok(())
}

fn add_units(sold: u64, units: u32) -> Result<u64> {
    sold.checked_add(u64::from(units))
        .ok_or_else(|| LedgerError::InvalidInput(format!("units sold overflow: {sold} + {units}")))
}

/// Stages every aggregate change for one confirmed order.
pub async fn record_confirmed_order<S>(
    tx: &mut Transaction<'_, S>,
    order: &Order,
) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    for line in &order.line_items {
        record_sale(
            tx,
            order.pipeline,
            &line.catalog_item_id,
            &line.name,
            line.quantity,
            line.total()?,
        )
        .await?;
    }

    let summary_key = order.pipeline.sales_summary();
    let mut summary = match tx.get(&summary_key).await? {
        Some(document) => decode::<SalesSummary>(&document)?,
        None => SalesSummary::default(),
    };
    summary.total_orders_confirmed += 1;
    summary.last_updated = Some(Utc::now());
    tx.put(summary_key, &summary)?;
    Ok(())
}

/// Read side of the sales aggregates.
pub struct SalesReport<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> SalesReport<S> {
    /// Creates a report reader over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Global totals, zeroed if absent or unreadable.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, pipeline: Pipeline) -> SalesSummary {
        match self.try_summary(pipeline).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(%pipeline, error = %e, "sales summary unavailable, reporting zero");
                SalesSummary::default()
            }
        }
    }

    /// One product's counters, zeroed if absent or unreadable.
    #[tracing::instrument(skip(self))]
    pub async fn product(&self, pipeline: Pipeline, product_id: &ItemId) -> ProductSales {
        let key = DocumentKey::new(pipeline.product_sales(), product_id.as_str());
        let loaded = match self.store.get(&key).await {
            Ok(Some(document)) => decode::<ProductSales>(&document).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e.into()),
        };
        match loaded {
            Ok(Some(product)) => product,
            Ok(None) => ProductSales::empty(product_id.clone()),
            Err(e) => {
                warn!(%pipeline, product_id = %product_id, error = %e, "product sales unavailable");
                ProductSales::empty(product_id.clone())
            }
        }
    }

    /// Best-selling products, at most `limit`, empty if unreadable.
    #[tracing::instrument(skip(self))]
    pub async fn top_products(
        &self,
        pipeline: Pipeline,
        ranking: SalesRanking,
        limit: usize,
    ) -> Vec<ProductSales> {
        let documents = match self
            .store
            .query(DocumentQuery::collection(pipeline.product_sales()))
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                warn!(%pipeline, error = %e, "product sales unavailable, reporting none");
                return Vec::new();
            }
        };

        let mut products: Vec<ProductSales> = documents
            .iter()
            .filter_map(|document| match decode::<ProductSales>(document) {
                Ok(product) => Some(product),
                Err(e) => {
                    warn!(key = %document.key, error = %e, "skipping unreadable product sales");
                    None
                }
            })
            .collect();

        match ranking {
            SalesRanking::Revenue => products.sort_by(|a, b| {
                b.revenue
                    .cmp(&a.revenue)
                    .then_with(|| a.product_id.cmp(&b.product_id))
            }),
            SalesRanking::Units => products.sort_by(|a, b| {
                b.units_sold
                    .cmp(&a.units_sold)
                    .then_with(|| a.product_id.cmp(&b.product_id))
            }),
        }
        products.truncate(limit);
        products
    }

    /// Top products by revenue.
    pub async fn top_products_by_revenue(
        &self,
        pipeline: Pipeline,
        limit: usize,
    ) -> Vec<ProductSales> {
        self.top_products(pipeline, SalesRanking::Revenue, limit).await
    }

    /// Top products by units sold.
    pub async fn top_products_by_units(
        &self,
        pipeline: Pipeline,
        limit: usize,
    ) -> Vec<ProductSales> {
        self.top_products(pipeline, SalesRanking::Units, limit).await
    }

    async fn try_summary(&self, pipeline: Pipeline) -> Result<SalesSummary> {
        match self.store.get(&pipeline.sales_summary()).await? {
            Some(document) => decode(&document),
            None => Ok(SalesSummary::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_store::{DocumentStoreExt, InMemoryDocumentStore};
    use serde_json::json;

    #[tokio::test]
    async fn first_sale_bootstraps_documents() {
        let store = InMemoryDocumentStore::new();
        let mut tx = Transaction::new(&store);
        record_sale(
            &mut tx,
            Pipeline::Plant,
            &ItemId::new("p1"),
            "Fern",
            2,
            Money::from_cents(2000),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let report = SalesReport::new(store.clone());
        let product = report.product(Pipeline::Plant, &ItemId::new("p1")).await;
        assert_eq!(product.units_sold, 2);
        assert_eq!(product.revenue, Money::from_cents(2000));

        let summary = report.summary(Pipeline::Plant).await;
        assert_eq!(summary.total_revenue, Money::from_cents(2000));
        assert_eq!(summary.total_units_sold, 2);
        assert_eq!(summary.total_orders_confirmed, 0);
        assert!(store.exists(&DocumentKey::new("sales_summary", "statistics")).await.unwrap());
    }

    #[tokio::test]
    async fn sales_increment_existing_counters() {
        let store = InMemoryDocumentStore::new();
        store
            .put_unchecked(
                DocumentKey::new("product_sales", "p1"),
                &json!({
                    "product_id": "p1",
                    "name": "Fern",
                    "units_sold": "3",
                    "revenue_cents": 3000
                }),
            )
            .await
            .unwrap();

        let mut tx = Transaction::new(&store);
        record_sale(
            &mut tx,
            Pipeline::Plant,
            &ItemId::new("p1"),
            "Fern",
            1,
            Money::from_cents(1000),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let product = SalesReport::new(store).product(Pipeline::Plant, &ItemId::new("p1")).await;
        assert_eq!(product.units_sold, 4);
        assert_eq!(product.revenue, Money::from_cents(4000));
    }

    #[tokio::test]
    async fn revenue_overflow_rejects_the_sale() {
        let store = InMemoryDocumentStore::new();
        store
            .put_unchecked(
                DocumentKey::new("product_sales", "p1"),
                &json!({"product_id": "p1", "revenue_cents": i64::MAX - 10}),
            )
            .await
            .unwrap();

        let mut tx = Transaction::new(&store);
        let result = record_sale(
            &mut tx,
            Pipeline::Plant,
            &ItemId::new("p1"),
            "Fern",
            1,
            Money::from_cents(11),
        )
        .await;
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));

        let product = SalesReport::new(store)
            .product(Pipeline::Plant, &ItemId::new("p1"))
            .await;
        assert_eq!(product.revenue, Money::from_cents(i64::MAX - 10));
    }

    #[tokio::test]
    async fn pipelines_keep_separate_aggregates() {
        let store = InMemoryDocumentStore::new();
        let mut tx = Transaction::new(&store);
        record_sale(
            &mut tx,
            Pipeline::Material,
            &ItemId::new("m1"),
            "Peat",
            7,
            Money::from_cents(700),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let report = SalesReport::new(store);
        assert_eq!(report.summary(Pipeline::Plant).await, SalesSummary::default());
        assert_eq!(report.summary(Pipeline::Material).await.total_units_sold, 7);
    }

    #[tokio::test]
    async fn unreadable_summary_degrades_to_zero() {
        let store = InMemoryDocumentStore::new();
        store
            .put_unchecked(
                DocumentKey::new("sales_summary", "statistics"),
                &json!({"total_units_sold": "many"}),
            )
            .await
            .unwrap();

        let summary = SalesReport::new(store).summary(Pipeline::Plant).await;
        assert_eq!(summary, SalesSummary::default());
    }

    #[tokio::test]
    async fn top_products_ranks_and_limits() {
        let store = InMemoryDocumentStore::new();
        for (id, units, revenue) in [("a", 10, 100), ("b", 1, 5000), ("c", 5, 900)] {
            store
                .put_unchecked(
                    DocumentKey::new("product_sales", id),
                    &json!({
                        "product_id": id,
                        "name": id,
                        "units_sold": units,
                        "revenue_cents": revenue
                    }),
                )
                .await
                .unwrap();
        }

        let report = SalesReport::new(store);
        let by_revenue: Vec<_> = report
            .top_products_by_revenue(Pipeline::Plant, 2)
            .await
            .into_iter()
            .map(|p| p.product_id.to_string())
            .collect();
        assert_eq!(by_revenue, vec!["b", "c"]);

        let by_units: Vec<_> = report
            .top_products_by_units(Pipeline::Plant, 10)
            .await
            .into_iter()
            .map(|p| p.product_id.to_string())
            .collect();
        assert_eq!(by_units, vec!["a", "c", "b"]);
    }
}
