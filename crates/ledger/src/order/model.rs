use chrono::{DateTime, Utc};
use common::{ActorId, ItemId, OrderId};
use doc_store::Document;
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::cart::CartLine;
use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::normalize;
use crate::pipeline::Pipeline;
use crate::stock::Restock;

/// One product on an order, with the price captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub catalog_item_id: ItemId,
    pub name: String,
    #[serde(deserialize_with = "normalize::quantity")]
    pub quantity: u32,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns quantity × unit price.
    pub fn total(&self) -> Result<Money> {
        self.unit_price.multiply(self.quantity)
    }

    pub(crate) fn restock(&self) -> Restock<'_> {
        Restock {
            item_id: &self.catalog_item_id,
            name: &self.name,
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            catalog_item_id: line.catalog_item_id.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// A completed checkout.
///
/// Only `status` and the settlement fields change after creation, and only
/// by copying the order into the partition of its new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub pipeline: Pipeline,
    pub buyer_id: ActorId,
    pub line_items: Vec<OrderLine>,
    #[serde(rename = "total_amount_cents")]
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Buyer display name, resolved when the order is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_address: Option<String>,
}

impl Order {
    /// Builds a pending order from cart lines.
    ///
    /// Fails with `InvalidInput` if the order total does not fit in an amount.
    pub fn pending(pipeline: Pipeline, buyer_id: ActorId, lines: &[CartLine]) -> Result<Self> {
        let line_items: Vec<OrderLine> = lines.iter().map(OrderLine::from).collect();
        let total_amount = Money::try_sum(
            line_items
                .iter()
                .map(OrderLine::total)
                .collect::<Result<Vec<_>>>()?,
        )?;
        Ok(Self {
            id: OrderId::new(),
            pipeline,
            buyer_id,
            total_amount,
            line_items,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            confirmed_at: None,
            cancelled_at: None,
            buyer_name: None,
            buyer_address: None,
        })
    }

    /// Total units across all lines.
    pub fn total_units(&self) -> u64 {
        self.line_items.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub(crate) fn from_document(document: &Document) -> Result<Self> {
        serde_json::from_value(document.body.clone()).map_err(|e| LedgerError::InvalidDocument {
            key: document.key.clone(),
            reason: e.to_string(),
        })
    }
}
