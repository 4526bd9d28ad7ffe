use doc_store::DocumentStore;

use crate::cart::CartAggregator;
use crate::catalog::CatalogStore;
use crate::config::LedgerConfig;
use crate::order::OrderLedger;
use crate::sales::SalesReport;

/// All ledger components sharing one store handle.
pub struct Ledger<S: DocumentStore> {
    pub catalog: CatalogStore<S>,
    pub carts: CartAggregator<S>,
    pub orders: OrderLedger<S>,
    pub sales: SalesReport<S>,
}

impl<S: DocumentStore + Clone> Ledger<S> {
    /// Builds every component over clones of `store`.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            catalog: CatalogStore::new(store.clone(), config.retry),
            carts: CartAggregator::new(store.clone(), config.retry),
            orders: OrderLedger::new(store.clone(), config.retry),
            sales: SalesReport::new(store),
        }
    }
}
