//! Parallel block verification.
//!
//! ```text
//!   block ──► uniqueness ──► sanity (par) ──► chunks ──► batch (par) ──► chain (par) ──► Accepted
//!                                               │
//!                                     batch_size txs per range-proof batch
//! ```
//!
//! Every stage reports the lowest failing index, so the result does not
//! depend on how the pool schedules work.

use anyhow::Result;
use obscura_transaction::{
    Accepted, BatchFailure, ItselfValidated, SanityChecked, Unvalidated, Validatable,
    ValidationContext, check_block_uniqueness, validate_batch,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

pub struct VerifierPool {
    pool: ThreadPool,
    batch_size: usize,
}

/// First error in index order.
fn first_failure<T>(
    results: Vec<std::result::Result<T, BatchFailure>>,
) -> std::result::Result<Vec<T>, BatchFailure> {
    results.into_iter().collect()
}

impl VerifierPool {
    /// `threads == 0` uses one thread per core.
    pub fn new(threads: usize, batch_size: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("obscura-verifier-{i}"))
            .build()?;
        info!(threads = pool.current_num_threads(), batch_size, "verifier pool started");
        Ok(Self {
            pool,
            batch_size: batch_size.max(1),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run a whole block through the pipeline.
    pub fn verify_block<T>(
        &self,
        txs: Vec<T>,
        ctx: &ValidationContext<'_>,
    ) -> std::result::Result<Vec<Accepted<T>>, BatchFailure>
    where
        T: Validatable + Send + Sync,
    {
        let batch_size = self.batch_size;
        self.pool.install(|| {
            check_block_uniqueness(&txs)?;

            let checked: Vec<SanityChecked<T>> = first_failure(
                txs.into_par_iter()
                    .enumerate()
                    .map(|(index, tx)| {
                        Unvalidated::new(tx)
                            .sanity_check(ctx)
                            .map_err(|rejection| BatchFailure {
                                index,
                                error: rejection.error,
                            })
                    })
                    .collect(),
            )?;
            debug!(count = checked.len(), "block sanity checked");

            let mut chunks: Vec<Vec<SanityChecked<T>>> = Vec::new();
            let mut remaining = checked.into_iter().peekable();
            while remaining.peek().is_some() {
                chunks.push(remaining.by_ref().take(batch_size).collect());
            }

            let validated: Vec<ItselfValidated<T>> = first_failure(
                chunks
                    .into_par_iter()
                    .enumerate()
                    .map(|(chunk, txs)| {
                        validate_batch(txs, ctx).map_err(|failure| BatchFailure {
                            index: chunk * batch_size + failure.index,
                            error: failure.error,
                        })
                    })
                    .collect(),
            )?
            .into_iter()
            .flatten()
            .collect();
            debug!(count = validated.len(), "block validated by itself");

            first_failure(
                validated
                    .into_par_iter()
                    .enumerate()
                    .map(|(index, tx)| {
                        tx.validate_against_chain(ctx)
                            .map(|tx| tx.accept())
                            .map_err(|rejection| BatchFailure {
                                index,
                                error: rejection.error,
                            })
                    })
                    .collect(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_privacy::operation::random_scalar;
    use obscura_privacy::{CoinV2, KeySet, PaymentInfo, Proof, ProofV2, TokenId};
    use obscura_transaction::{
        MemoryChainState, Transaction, TransactionError, TxParams, TxType, ValidationEnvironment,
    };

    fn mint() -> Transaction {
        let (coin, _) = CoinV2::derive(
            &PaymentInfo::new(KeySet::random().payment_address, 4),
            0,
            &random_scalar(),
            None,
            false,
        );
        Transaction {
            version: 2,
            tx_type: TxType::Mint,
            lock_time: 0,
            fee: 0,
            token_id: TokenId::NATIVE,
            info: Vec::new(),
            sig_pub_key: Vec::new(),
            sig: vec![1],
            proof: Proof::V2(ProofV2::mint(vec![coin])),
            metadata: None,
        }
    }

    fn run(txs: Vec<Transaction>) -> std::result::Result<Vec<Accepted<Transaction>>, BatchFailure> {
        let state = MemoryChainState::new();
        let params = TxParams::default();
        let ctx = ValidationContext::new(ValidationEnvironment::new(0, 1_000), &state, &params);
        VerifierPool::new(2, 2).unwrap().verify_block(txs, &ctx)
    }

    #[test]
    fn test_empty_block_accepted() {
        assert!(run(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_zero_threads_picks_default() {
        let pool = VerifierPool::new(0, 0).unwrap();
        assert!(pool.threads() >= 1);
        assert_eq!(pool.batch_size, 1);
    }

    #[test]
    fn test_duplicate_in_block_rejected_before_crypto() {
        let tx = mint();
        let failure = run(vec![mint(), tx.clone(), tx]).err().unwrap();
        assert_eq!(failure.index, 2);
        assert!(matches!(failure.error, TransactionError::ReplayedOutput(_)));
    }

    #[test]
    fn test_lowest_sanity_failure_reported() {
        let mut txs: Vec<Transaction> = (0..6).map(|_| mint()).collect();
        txs[4].token_id = TokenId([7; 32]);
        txs[1].token_id = TokenId([7; 32]);
        let failure = run(txs).err().unwrap();
        assert_eq!(failure.index, 1);
        assert!(matches!(failure.error, TransactionError::InvalidType(_)));
    }
}
