//! Optimistic transactions over a [`DocumentStore`].
//!
//! A [`Transaction`] records the version of every document it reads and
//! stages its writes in memory. On commit the reads become preconditions of
//! a single [`WriteBatch`], so the commit fails with a concurrency conflict
//! if anything it looked at changed in the meantime. [`with_retry`] reruns
//! the whole read-validate-write closure when that happens.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use doc_store::{
    CommittedWrite, Document, DocumentKey, DocumentQuery, DocumentStore, Precondition, Version,
    WriteBatch, WriteOp,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone)]
enum Staged {
    Put(Value),
    Insert(Value),
    Delete,
}

/// A unit of work whose reads and writes commit atomically.
pub struct Transaction<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    reads: HashMap<DocumentKey, Option<Document>>,
    writes: BTreeMap<DocumentKey, Staged>,
}

impl<'s, S: DocumentStore + ?Sized> Transaction<'s, S> {
    /// Starts an empty transaction against `store`.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Reads a document, seeing this transaction's own staged writes.
    pub async fn get(&mut self, key: &DocumentKey) -> Result<Option<Document>> {
        let observed = self.observe(key).await?;
        Ok(match self.writes.get(key) {
            Some(Staged::Put(body)) | Some(Staged::Insert(body)) => Some(Document::new(
                key.clone(),
                observed.map(|d| d.version).unwrap_or_else(Version::initial),
                body.clone(),
            )),
            Some(Staged::Delete) => None,
            None => observed,
        })
    }

    /// Runs a query and records every returned document as read.
    ///
    /// Staged writes in the queried collection are overlaid on the result.
    /// Documents inserted by other clients after the query are not detected.
    pub async fn query(&mut self, query: DocumentQuery) -> Result<Vec<Document>> {
        let found = self.store.query(query.clone()).await?;

        let mut by_key: BTreeMap<DocumentKey, Document> = BTreeMap::new();
        for document in found {
            let document = match self.reads.get(&document.key) {
                Some(Some(cached)) => cached.clone(),
                Some(None) => continue,
                None => {
                    self.reads
                        .insert(document.key.clone(), Some(document.clone()));
                    document
                }
            };
            by_key.insert(document.key.clone(), document);
        }

        for (key, staged) in &self.writes {
            if key.collection != query.collection {
                continue;
            }
            match staged {
                Staged::Delete => {
                    by_key.remove(key);
                }
                Staged::Put(body) | Staged::Insert(body) => {
                    let version = by_key
                        .get(key)
                        .map(|d| d.version)
                        .unwrap_or_else(Version::initial);
                    let candidate = Document::new(key.clone(), version, body.clone());
                    if query.matches(&candidate) {
                        by_key.insert(key.clone(), candidate);
                    } else {
                        by_key.remove(key);
                    }
                }
            }
        }

        Ok(by_key.into_values().collect())
    }

    /// Stages a write that replaces the document if it exists or creates it.
    pub fn put<T: Serialize>(&mut self, key: DocumentKey, body: &T) -> Result<()> {
        let body = serde_json::to_value(body)?;
        let staged = match self.writes.get(&key) {
            Some(Staged::Insert(_)) => Staged::Insert(body),
            _ => Staged::Put(body),
        };
        self.writes.insert(key, staged);
        Ok(())
    }

    /// Stages a write that requires the document not to exist at commit time.
    pub fn insert<T: Serialize>(&mut self, key: DocumentKey, body: &T) -> Result<()> {
        self.writes.insert(key, Staged::Insert(serde_json::to_value(body)?));
        Ok(())
    }

    /// Stages a delete.
    pub fn delete(&mut self, key: DocumentKey) {
        if let Some(Staged::Insert(_)) = self.writes.get(&key) {
            self.writes.remove(&key);
        } else {
            self.writes.insert(key, Staged::Delete);
        }
    }

    /// Returns true if nothing has been staged.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Builds the batch this transaction would commit.
    pub fn to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();

        for (key, staged) in &self.writes {
            let read = self.read_precondition(key);
            let op = match staged {
                Staged::Insert(body) => WriteOp::Put {
                    key: key.clone(),
                    body: body.clone(),
                    precondition: Precondition::Absent,
                },
                Staged::Put(body) => WriteOp::Put {
                    key: key.clone(),
                    body: body.clone(),
                    precondition: read.unwrap_or(Precondition::Any),
                },
                Staged::Delete => WriteOp::Delete {
                    key: key.clone(),
                    precondition: read.unwrap_or(Precondition::Any),
                },
            };
            batch.push(op);
        }

        let mut checked: Vec<&DocumentKey> = self
            .reads
            .keys()
            .filter(|key| !self.writes.contains_key(*key))
            .collect();
        checked.sort();
        for key in checked {
            if let Some(precondition) = self.read_precondition(key) {
                batch.push(WriteOp::Check {
                    key: key.clone(),
                    precondition,
                });
            }
        }

        batch
    }

    /// Commits staged writes under the preconditions of every read.
    ///
    /// A transaction that staged nothing commits nothing.
    pub async fn commit(self) -> Result<Vec<CommittedWrite>> {
        if self.is_read_only() {
            return Ok(Vec::new());
        }
        let batch = self.to_batch();
        debug!(ops = batch.len(), "committing transaction");
        Ok(self.store.commit(batch).await?)
    }

    async fn observe(&mut self, key: &DocumentKey) -> Result<Option<Document>> {
        if let Some(cached) = self.reads.get(key) {
            return Ok(cached.clone());
        }
        let document = self.store.get(key).await?;
        self.reads.insert(key.clone(), document.clone());
        Ok(document)
    }

    fn read_precondition(&self, key: &DocumentKey) -> Option<Precondition> {
        self.reads.get(key).map(|observed| match observed {
            Some(document) => Precondition::observed(document.version),
            None => Precondition::Absent,
        })
    }
}

/// Bounded retry with exponential backoff for conflicting transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up on the first conflict.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails with a non-conflict error,
/// or the policy's attempts are exhausted.
///
/// Each invocation of `attempt` must build a fresh [`Transaction`] so that
/// every retry re-reads current state.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut tries = 1;

    loop {
        match attempt().await {
            Err(error) if error.is_conflict() => {
                metrics::counter!("ledger_transaction_conflicts_total", "operation" => operation)
                    .increment(1);

                if tries >= max_attempts {
                    warn!(operation, attempts = tries, "giving up after repeated conflicts");
                    return Err(LedgerError::TransactionConflict { attempts: tries });
                }

                let delay = policy.delay_for(tries);
                debug!(operation, attempt = tries, ?delay, %error, "conflict, retrying");
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            other => return other,
        }
    }
}
