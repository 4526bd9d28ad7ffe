//! Order and inventory ledger for the nursery storefront.
//!
//! This crate provides the transactional core shared by every actor role:
//! - [`CatalogStore`]: plant and material listings with their stock on hand
//! - [`CartAggregator`]: per-actor cart lines that reserve stock when added
//! - [`OrderLedger`]: checkout and the pending → confirmed | cancelled state machine
//! - [`SalesReport`]: the realized-sales aggregates written on confirmation
//!
//! Every stock mutation runs as a [`Transaction`] against a
//! [`doc_store::DocumentStore`] and is retried under a [`RetryPolicy`]
//! when another client wins the race.

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod money;
pub mod normalize;
pub mod order;
pub mod pipeline;
pub mod sales;
pub mod stock;
pub mod transaction;

pub use cart::{CartAggregator, CartLine, CartLineView, CartView};
pub use catalog::{CatalogFilter, CatalogItem, CatalogStore, NewCatalogItem};
pub use common::{ActorId, ItemId, LineId, OrderId};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use money::Money;
pub use normalize::BuyerProfile;
pub use order::{Order, OrderLedger, OrderLine, OrderStatus};
pub use pipeline::{Pipeline, ReservationPolicy};
pub use sales::{ProductSales, SalesRanking, SalesReport, SalesSummary};
pub use transaction::{RetryPolicy, Transaction, with_retry};
