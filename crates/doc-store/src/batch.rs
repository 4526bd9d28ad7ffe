use std::collections::HashSet;

use serde::Serialize;

use crate::{DocumentKey, Result, StoreError, Version};

/// Condition a document must satisfy for a batch to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// No check is performed (use with caution).
    Any,
    /// The document must not exist.
    Absent,
    /// The document must exist, at any version.
    Exists,
    /// The document must be at exactly this version.
    Version(Version),
}

impl Precondition {
    /// Creates the precondition matching a version observed by a read.
    ///
    /// An observed version of 0 means the read found nothing.
    pub fn observed(version: Version) -> Self {
        if version == Version::initial() {
            Precondition::Absent
        } else {
            Precondition::Version(version)
        }
    }

    /// Returns true if a document at `actual` (None when absent) satisfies this condition.
    pub fn holds(&self, actual: Option<Version>) -> bool {
        match self {
            Precondition::Any => true,
            Precondition::Absent => actual.is_none(),
            Precondition::Exists => actual.is_some(),
            Precondition::Version(expected) => actual == Some(*expected),
        }
    }
}

impl std::fmt::Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Precondition::Any => write!(f, "any version"),
            Precondition::Absent => write!(f, "absent"),
            Precondition::Exists => write!(f, "present"),
            Precondition::Version(v) => write!(f, "version {v}"),
        }
    }
}

/// A single operation inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Creates or replaces a document.
    Put {
        key: DocumentKey,
        body: serde_json::Value,
        precondition: Precondition,
    },
    /// Removes a document.
    Delete {
        key: DocumentKey,
        precondition: Precondition,
    },
    /// Validates a document that was read but is not written.
    Check {
        key: DocumentKey,
        precondition: Precondition,
    },
}

impl WriteOp {
    /// Returns the key this operation targets.
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key, .. } | WriteOp::Check { key, .. } => {
                key
            }
        }
    }

    /// Returns the precondition of this operation.
    pub fn precondition(&self) -> Precondition {
        match self {
            WriteOp::Put { precondition, .. }
            | WriteOp::Delete { precondition, .. }
            | WriteOp::Check { precondition, .. } => *precondition,
        }
    }
}

/// A group of writes that commit atomically.
///
/// Every precondition is checked before any operation is applied; if one
/// fails, the whole batch is rejected and the store is unchanged.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a put of a serializable body.
    pub fn put<T: Serialize>(
        mut self,
        key: DocumentKey,
        body: &T,
        precondition: Precondition,
    ) -> Result<Self> {
        self.push(WriteOp::Put {
            key,
            body: serde_json::to_value(body)?,
            precondition,
        });
        Ok(self)
    }

    /// Adds a delete.
    pub fn delete(mut self, key: DocumentKey, precondition: Precondition) -> Self {
        self.push(WriteOp::Delete { key, precondition });
        self
    }

    /// Adds a read validation.
    pub fn check(mut self, key: DocumentKey, precondition: Precondition) -> Self {
        self.push(WriteOp::Check { key, precondition });
        self
    }

    /// Appends a raw operation.
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Returns the operations in insertion order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Validates a batch before it is committed.
pub fn validate_batch(batch: &WriteBatch) -> Result<()> {
    if batch.is_empty() {
        return Err(StoreError::InvalidBatch(
            "Cannot commit an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(batch.len());
    for op in batch.ops() {
        if !seen.insert(op.key()) {
            return Err(StoreError::InvalidBatch(format!(
                "Document {} appears more than once in the batch",
                op.key()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_holds() {
        assert!(Precondition::Any.holds(None));
        assert!(Precondition::Any.holds(Some(Version::first())));
        assert!(Precondition::Absent.holds(None));
        assert!(!Precondition::Absent.holds(Some(Version::first())));
        assert!(Precondition::Exists.holds(Some(Version::new(3))));
        assert!(!Precondition::Exists.holds(None));
        assert!(Precondition::Version(Version::new(2)).holds(Some(Version::new(2))));
        assert!(!Precondition::Version(Version::new(2)).holds(Some(Version::new(3))));
        assert!(!Precondition::Version(Version::new(2)).holds(None));
    }

    #[test]
    fn observed_initial_version_means_absent() {
        assert_eq!(
            Precondition::observed(Version::initial()),
            Precondition::Absent
        );
        assert_eq!(
            Precondition::observed(Version::new(4)),
            Precondition::Version(Version::new(4))
        );
    }

    #[test]
    fn empty_batch_is_invalid() {
        let result = validate_batch(&WriteBatch::new());
        assert!(matches!(result, Err(StoreError::InvalidBatch(_))));
    }

    #[test]
    fn duplicate_key_is_invalid() {
        let key = DocumentKey::new("cart", "l1");
        let batch = WriteBatch::new()
            .put(key.clone(), &serde_json::json!({}), Precondition::Any)
            .unwrap()
            .delete(key, Precondition::Any);
        assert!(matches!(
            validate_batch(&batch),
            Err(StoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn distinct_keys_are_valid() {
        let batch = WriteBatch::new()
            .put(
                DocumentKey::new("inventory", "p1"),
                &serde_json::json!({"quantity": 1}),
                Precondition::Exists,
            )
            .unwrap()
            .check(DocumentKey::new("user_data", "u1"), Precondition::Any);
        assert!(validate_batch(&batch).is_ok());
        assert_eq!(batch.len(), 2);
    }
}
