//! Document store boundary for the ledger.
//!
//! Data lives in named collections of schemaless JSON documents. Every
//! document carries a version, and writes are grouped into a [`WriteBatch`]
//! whose preconditions are checked and applied all-or-nothing.

pub mod batch;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use batch::{Precondition, WriteBatch, WriteOp};
pub use document::{Document, DocumentKey, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{CommittedWrite, DocumentStore, DocumentStoreExt};
