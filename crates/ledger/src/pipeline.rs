//! Role-specific collection mapping.
//!
//! Buyers purchase plants and nursery workers purchase raw materials from
//! suppliers. Both run the same cart → order → confirm | cancel workflow;
//! a [`Pipeline`] names the collections and policies each one uses.

use std::str::FromStr;

use doc_store::DocumentKey;
use serde::{Deserialize, Serialize};

/// Collection holding plant growth records awaiting promotion to inventory.
pub const GROWTH_RECORDS: &str = "plant_growth";

/// Collection of actor profiles, read when an order is confirmed.
pub const USER_DATA: &str = "user_data";

/// How much stock a new cart line reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationPolicy {
    /// Reserve a single unit.
    Unit,
    /// Reserve everything currently on hand.
    WholeStock,
}

/// The workflow an actor participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    /// Buyers purchasing plants from the nursery.
    Plant,
    /// Nursery workers purchasing materials from suppliers.
    Material,
}

impl Pipeline {
    /// Catalog collection whose stock is reserved at add-to-cart time.
    pub fn catalog(&self) -> &'static str {
        match self {
            Pipeline::Plant => "inventory",
            Pipeline::Material => "Material_for_sell",
        }
    }

    /// Cart line collection.
    pub fn cart(&self) -> &'static str {
        match self {
            Pipeline::Plant => "cart",
            Pipeline::Material => "nursery_cart",
        }
    }

    /// Collection of orders awaiting confirmation.
    pub fn pending_orders(&self) -> &'static str {
        match self {
            Pipeline::Plant => "ordered",
            Pipeline::Material => "nursery_orders",
        }
    }

    /// Collection of confirmed orders.
    pub fn confirmed_orders(&self) -> &'static str {
        match self {
            Pipeline::Plant => "confirmed",
            Pipeline::Material => "supplier_confirmed_orders",
        }
    }

    /// Collection of cancelled orders.
    pub fn cancelled_orders(&self) -> &'static str {
        match self {
            Pipeline::Plant => "cancelled_orders",
            Pipeline::Material => "nursery_cancelled_orders",
        }
    }

    /// Authoritative stock that checkout re-validates and decrements, when
    /// it differs from the catalog reserved at cart time.
    pub fn checkout_stock(&self) -> Option<&'static str> {
        match self {
            Pipeline::Plant => None,
            Pipeline::Material => Some("supplier_stock"),
        }
    }

    /// Amount of stock a new cart line reserves.
    pub fn reservation(&self) -> ReservationPolicy {
        match self {
            Pipeline::Plant => ReservationPolicy::Unit,
            Pipeline::Material => ReservationPolicy::WholeStock,
        }
    }

    /// Whether confirming an order guarantees a catalog entry for each product.
    pub fn placeholder_on_confirm(&self) -> bool {
        matches!(self, Pipeline::Plant)
    }

    /// Key of the global sales totals document.
    pub fn sales_summary(&self) -> DocumentKey {
        match self {
            Pipeline::Plant => DocumentKey::new("sales_summary", "statistics"),
            Pipeline::Material => DocumentKey::new("supplier_sales_summary", "statistics"),
        }
    }

    /// Collection of per-product sales aggregates.
    pub fn product_sales(&self) -> &'static str {
        match self {
            Pipeline::Plant => "product_sales",
            Pipeline::Material => "supplier_product_sales",
        }
    }

    /// Category assigned to catalog items that carry none.
    pub fn default_category(&self) -> &'static str {
        match self {
            Pipeline::Plant => "plant",
            Pipeline::Material => "material",
        }
    }

    /// Returns the pipeline name used in URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::Plant => "plants",
            Pipeline::Material => "materials",
        }
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Pipeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plant" | "plants" => Ok(Pipeline::Plant),
            "material" | "materials" => Ok(Pipeline::Material),
            other => Err(format!("unknown pipeline: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plant_pipeline_collections() {
        let p = Pipeline::Plant;
        assert_eq!(p.catalog(), "inventory");
        assert_eq!(p.cart(), "cart");
        assert_eq!(p.pending_orders(), "ordered");
        assert_eq!(p.confirmed_orders(), "confirmed");
        assert_eq!(p.checkout_stock(), None);
        assert_eq!(p.reservation(), ReservationPolicy::Unit);
        assert_eq!(p.sales_summary().to_string(), "sales_summary/statistics");
    }

    #[test]
    fn material_pipeline_collections() {
        let p = Pipeline::Material;
        assert_eq!(p.catalog(), "Material_for_sell");
        assert_eq!(p.cart(), "nursery_cart");
        assert_eq!(p.pending_orders(), "nursery_orders");
        assert_eq!(p.confirmed_orders(), "supplier_confirmed_orders");
        assert_eq!(p.checkout_stock(), Some("supplier_stock"));
        assert_eq!(p.reservation(), ReservationPolicy::WholeStock);
        assert!(!p.placeholder_on_confirm());
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("plants".parse::<Pipeline>().unwrap(), Pipeline::Plant);
        assert_eq!("material".parse::<Pipeline>().unwrap(), Pipeline::Material);
        assert!("seeds".parse::<Pipeline>().is_err());
        assert_eq!(Pipeline::Material.to_string(), "materials");
    }
}
