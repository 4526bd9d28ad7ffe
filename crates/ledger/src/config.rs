use crate::transaction::RetryPolicy;

/// Tunables for a [`crate::Ledger`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Retry policy applied to every mutating operation.
    pub retry: RetryPolicy,
}

impl LedgerConfig {
    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
