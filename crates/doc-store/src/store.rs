use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::{Document, DocumentKey, DocumentQuery, Precondition, Result, Version, WriteBatch};

/// Outcome of one write inside a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedWrite {
    /// The document written.
    pub key: DocumentKey,
    /// Version after the write, or `Version::initial()` for a delete.
    pub version: Version,
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Retrieves a single document.
    ///
    /// Returns None if it doesn't exist.
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>>;

    /// Retrieves the documents matching a query, ordered by id.
    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Commits a batch atomically - either every operation applies or none do.
    ///
    /// Fails with `ConcurrencyConflict` if any precondition does not hold.
    /// Returns the resulting version of every put and delete, in no particular
    /// order (checks are omitted).
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<CommittedWrite>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Checks if a document exists.
    async fn exists(&self, key: &DocumentKey) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Retrieves a document and deserializes its body.
    async fn get_as<T: DeserializeOwned + Send>(&self, key: &DocumentKey) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(document) => Ok(Some(document.deserialize()?)),
            None => Ok(None),
        }
    }

    /// Writes a single document without a version check.
    async fn put_unchecked<T: Serialize + Sync>(
        &self,
        key: DocumentKey,
        body: &T,
    ) -> Result<Version> {
        let batch = WriteBatch::new().put(key, body, Precondition::Any)?;
        let written = self.commit(batch).await?;
        Ok(written
            .first()
            .map(|w| w.version)
            .unwrap_or(Version::initial()))
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
