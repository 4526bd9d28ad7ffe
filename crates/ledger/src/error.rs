//! Ledger error types.

use common::{ActorId, ItemId, OrderId};
use doc_store::{DocumentKey, StoreError};
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A referenced catalog item, cart line, order or growth record is absent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Not enough stock to reserve the requested quantity.
    #[error("Out of stock: {item_id} has {available} available, {requested} requested")]
    OutOfStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// A stock change would leave the quantity on hand negative or out of range.
    #[error("Insufficient stock: {item_id} has {on_hand} on hand, cannot apply {delta}")]
    InsufficientStock {
        item_id: ItemId,
        on_hand: u32,
        delta: i64,
    },

    /// The actor's cart already holds a line for this item.
    #[error("Item {item_id} is already in the cart of {owner_id}")]
    DuplicateLine { owner_id: ActorId, item_id: ItemId },

    /// The order state machine does not allow this transition.
    #[error("Invalid transition: cannot {action} order {order_id} from {current} state")]
    InvalidTransition {
        order_id: OrderId,
        current: OrderStatus,
        action: &'static str,
    },

    /// The order has already reached a terminal state.
    #[error("Order {order_id} is already {status}")]
    AlreadyTerminal {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Checkout was requested for a cart with no lines.
    #[error("Cart of {owner_id} is empty")]
    EmptyCart { owner_id: ActorId },

    /// A quantity argument is out of range.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A field of a request is missing or out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Concurrent writers kept winning until the retry budget ran out.
    #[error("Transaction conflict: gave up after {attempts} attempts")]
    TransactionConflict { attempts: u32 },

    /// A stored document could not be normalized.
    #[error("Invalid document {key}: {reason}")]
    InvalidDocument { key: DocumentKey, reason: String },

    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns true if the error came from losing an optimistic concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_conflict())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
