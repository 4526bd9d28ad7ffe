use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Document, DocumentKey, DocumentQuery, Result, StoreError, Version, WriteBatch, WriteOp,
    batch::validate_batch,
    store::{CommittedWrite, DocumentStore},
};

/// In-memory document store implementation for testing and local runs.
///
/// This implementation keeps every document in memory and provides the
/// same atomicity guarantees as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<DocumentKey, Document>>>,
    injected_conflicts: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with a concurrency conflict,
    /// as if another client had written first.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns the number of documents in one collection.
    pub async fn collection_len(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|k| k.collection == collection)
            .count()
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let matching = documents
            .values()
            .filter(|d| query.matches(d))
            .skip(query.offset.unwrap_or(0));

        let results = match query.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(results)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<CommittedWrite>> {
        validate_batch(&batch)?;

        let mut documents = self.documents.write().await;

        if self.take_injected_conflict()
            && let Some(op) = batch.ops().first()
        {
            let actual = documents
                .get(op.key())
                .map(|d| d.version)
                .unwrap_or(Version::initial());
            return Err(StoreError::ConcurrencyConflict {
                key: op.key().clone(),
                expected: op.precondition(),
                actual,
            });
        }

        // Check every precondition before applying anything
        for op in batch.ops() {
            let current = documents.get(op.key()).map(|d| d.version);
            if !op.precondition().holds(current) {
                metrics::counter!("doc_store_conflicts_total").increment(1);
                return Err(StoreError::ConcurrencyConflict {
                    key: op.key().clone(),
                    expected: op.precondition(),
                    actual: current.unwrap_or(Version::initial()),
                });
            }
        }

        let mut written = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { key, body, .. } => {
                    let version = documents
                        .get(&key)
                        .map(|d| d.version.next())
                        .unwrap_or(Version::first());
                    documents.insert(key.clone(), Document::new(key.clone(), version, body));
                    written.push(CommittedWrite { key, version });
                }
                WriteOp::Delete { key, .. } => {
                    documents.remove(&key);
                    written.push(CommittedWrite {
                        key,
                        version: Version::initial(),
                    });
                }
                WriteOp::Check { .. } => {}
            }
        }

        Ok(written)
    }
}
