use crate::loader::{LoadOutcome, LoaderChain};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Read-through cache over a [`LoaderChain`]: the chain runs on the first
/// `get` and the outcome is shared afterwards.
pub struct DatasetCache {
    chain: LoaderChain,
    cell: OnceCell<Arc<LoadOutcome>>,
}

impl DatasetCache {
    pub fn new(chain: LoaderChain) -> Self {
        Self {
            chain,
            cell: OnceCell::new(),
        }
    }

    /// Seed the cache with an already-loaded outcome.
    pub fn preloaded(chain: LoaderChain, outcome: LoadOutcome) -> Self {
        Self {
            chain,
            cell: OnceCell::new_with(Some(Arc::new(outcome))),
        }
    }

    pub async fn get(&self) -> Arc<LoadOutcome> {
        self.cell
            .get_or_init(|| async { Arc::new(self.chain.load().await) })
            .await
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Drop the cached outcome so the next `get` reloads.
    pub fn invalidate(&mut self) {
        self.cell.take();
    }
}
