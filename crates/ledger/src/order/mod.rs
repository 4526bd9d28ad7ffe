//! Orders: checkout, the pending → confirmed | cancelled state machine and
//! the partitions each state lives in.

mod ledger;
mod model;
mod state;

pub use ledger::OrderLedger;
pub use model::{Order, OrderLine};
pub use state::OrderStatus;
