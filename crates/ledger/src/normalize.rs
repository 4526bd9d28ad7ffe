//! Normalization of stored documents into typed entities.
//!
//! Documents written by form inputs carry numbers as strings, names under
//! several legacy fields and missing optional fields. All of that is settled
//! here, once, on read; the rest of the crate only sees typed values and
//! writes canonical field names.

use doc_store::Document;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::catalog::CatalogItem;
use crate::error::{LedgerError, Result};
use crate::money::Money;
use crate::pipeline::Pipeline;

/// Name used when a document carries none.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Coerces a JSON number or numeric string into a non-negative integer.
///
/// `null` and blank strings count as zero.
pub fn coerce_count(value: &Value) -> std::result::Result<u64, String> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(u)
            } else if let Some(f) = n.as_f64()
                && f >= 0.0
                && f.fract() == 0.0
                && f <= u64::MAX as f64
            {
                Ok(f as u64)
            } else {
                Err(format!("{n} is not a non-negative whole number"))
            }
        }
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("\"{s}\" is not a non-negative whole number")),
        other => Err(format!("expected a number, found {other}")),
    }
}

/// Coerces a value into a `u32` quantity.
pub fn coerce_quantity(value: &Value) -> std::result::Result<u32, String> {
    let count = coerce_count(value)?;
    u32::try_from(count).map_err(|_| format!("quantity {count} is out of range"))
}

/// Coerces a price written in major units (number or string) into cents.
pub fn coerce_money(value: &Value) -> std::result::Result<Money, String> {
    match value {
        Value::Null => Ok(Money::zero()),
        Value::String(s) if s.trim().is_empty() => Ok(Money::zero()),
        Value::Number(n) => {
            Money::parse_major(&n.to_string()).ok_or_else(|| format!("{n} is not a price"))
        }
        Value::String(s) => Money::parse_major(s).ok_or_else(|| format!("\"{s}\" is not a price")),
        other => Err(format!("expected a price, found {other}")),
    }
}

/// Serde adapter accepting a quantity as a number or numeric string.
pub fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    coerce_quantity(&value).map_err(serde::de::Error::custom)
}

/// Serde adapter accepting a counter as a number or numeric string.
pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    coerce_count(&value).map_err(serde::de::Error::custom)
}

/// Returns the first non-blank name, or [`UNKNOWN_NAME`].
pub fn display_name<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}

/// Catalog document as it may appear in storage.
#[derive(Debug, Deserialize)]
struct RawCatalogItem {
    // Consumed so the body id never leaks into metadata; the key is authoritative.
    #[serde(default)]
    #[allow(dead_code)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    common_name: Option<String>,
    #[serde(default)]
    unit_price_cents: Option<i64>,
    #[serde(default)]
    unit_price: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    category: Option<String>,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

/// Normalizes a catalog document into a [`CatalogItem`].
pub fn catalog_item(pipeline: Pipeline, document: &Document) -> Result<CatalogItem> {
    let invalid = |reason: String| LedgerError::InvalidDocument {
        key: document.key.clone(),
        reason,
    };

    let raw: RawCatalogItem =
        serde_json::from_value(document.body.clone()).map_err(|e| invalid(e.to_string()))?;

    let unit_price = match raw.unit_price_cents {
        Some(cents) => Money::from_cents(cents),
        None => coerce_money(raw.unit_price.as_ref().or(raw.price.as_ref()).unwrap_or(&Value::Null))
            .map_err(invalid)?,
    };
    if unit_price.is_negative() {
        return Err(invalid(format!("negative price {unit_price}")));
    }

    let quantity_on_hand = coerce_quantity(raw.quantity.as_ref().unwrap_or(&Value::Null))
        .map_err(|e| invalid(format!("quantity: {e}")))?;

    let category = raw
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| pipeline.default_category().to_string());

    Ok(CatalogItem {
        id: document.id().into(),
        name: display_name([raw.name.as_deref(), raw.common_name.as_deref()]),
        unit_price,
        quantity_on_hand,
        category,
        metadata: raw.metadata,
    })
}

/// Display details of the buyer, resolved from `user_data` when an order is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuyerProfile {
    pub display_name: String,
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

impl BuyerProfile {
    /// Profile used when the actor has no `user_data` document.
    pub fn unknown() -> Self {
        Self {
            display_name: UNKNOWN_NAME.to_string(),
            address: String::new(),
        }
    }

    /// Normalizes a `user_data` document; unreadable fields fall back to defaults.
    pub fn from_document(document: &Document) -> Self {
        let raw: RawProfile = serde_json::from_value(document.body.clone()).unwrap_or_default();
        Self {
            display_name: display_name([
                raw.name.as_deref(),
                raw.display_name.as_deref(),
                raw.full_name.as_deref(),
            ]),
            address: raw.address.unwrap_or_default().trim().to_string(),
        }
    }
}
