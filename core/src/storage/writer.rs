use anyhow::Result;
use obscura_transaction::{Accepted, LedgerDiff, Validatable};
use tracing::info;

use crate::storage::RocksChainState;

/// Applies accepted transactions of one block to persisted state.
pub struct BlockWriter<'a> {
    store: &'a RocksChainState,
    shard: u8,
}

impl<'a> BlockWriter<'a> {
    pub fn new(store: &'a RocksChainState, shard: u8) -> Self {
        Self { store, shard }
    }

    /// Collect every write the block makes and commit them in one batch.
    ///
    /// Only [`Accepted`] transactions can reach this point, so nothing here
    /// re-validates.
    pub fn apply<T: Validatable>(&self, txs: &[Accepted<T>]) -> Result<LedgerDiff> {
        let mut diff = LedgerDiff::new();
        for tx in txs {
            tx.record(&mut diff, self.shard);
        }
        if diff.is_empty() {
            info!(shard = self.shard, "block makes no state changes");
            return Ok(diff);
        }

        self.store.write_diff(&diff)?;
        info!(
            shard = self.shard,
            transactions = txs.len(),
            spent = diff.spent.len(),
            outputs = diff.outputs.len(),
            tokens = diff.tokens.len(),
            "block applied"
        );
        Ok(diff)
    }
}
