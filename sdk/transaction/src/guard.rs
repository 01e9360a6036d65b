//! Double-spend and replay guards.
//!
//! Spend identifiers (serial numbers, key images) are looked up under the
//! token and shard the transaction spends from. Output keys (one-time
//! addresses, serial-number derivators) are looked up under the token and
//! shard the coin lands in. Burned outputs are never stored, so they are
//! never checked.

use std::collections::HashMap;

use obscura_privacy::point_to_bytes;

use crate::batch::BatchFailure;
use crate::errors::{Result, TransactionError};
use crate::state::{ChainState, OutputRecord};
use crate::transaction::Transaction;
use crate::validation::Validatable;

/// Fails if any spend identifier of `tx` is already persisted.
pub fn check_double_spend(tx: &Transaction, state: &dyn ChainState, shard: u8) -> Result<()> {
    let token = tx.spend_ledger_token();
    for id in tx.proof.spent_identifiers() {
        let id = point_to_bytes(&id);
        if state
            .has_serial_number(&token, &id, shard)
            .map_err(TransactionError::state)?
        {
            return Err(TransactionError::DoubleSpend(hex::encode(id)));
        }
    }
    Ok(())
}

/// Fails if any output key of `tx` is already persisted.
pub fn check_replay(tx: &Transaction, state: &dyn ChainState) -> Result<()> {
    for coin in tx.output_coins() {
        let Some(record) = OutputRecord::from_coin(&tx.token_id, &coin) else {
            continue;
        };
        if let Some(ota) = record.ota {
            if state
                .has_one_time_address(&record.token_id, &ota, record.shard)
                .map_err(TransactionError::state)?
            {
                return Err(TransactionError::ReplayedOutput(hex::encode(ota)));
            }
        }
        if let Some(snd) = record.snd {
            if state
                .has_snd(&record.token_id, &snd, record.shard)
                .map_err(TransactionError::state)?
            {
                return Err(TransactionError::ReplayedOutput(hex::encode(snd)));
            }
        }
    }
    Ok(())
}

/// Spend identifiers and output keys must be unique across one block.
///
/// Reports the later of two conflicting transactions.
pub fn check_block_uniqueness<T: Validatable>(txs: &[T]) -> std::result::Result<(), BatchFailure> {
    let mut spent: HashMap<[u8; 32], usize> = HashMap::new();
    let mut outputs: HashMap<[u8; 32], usize> = HashMap::new();

    for (index, tx) in txs.iter().enumerate() {
        for layer in tx.layers() {
            for id in layer.proof.spent_identifiers() {
                let id = point_to_bytes(&id);
                if let Some(first) = spent.insert(id, index) {
                    if first != index {
                        return Err(BatchFailure {
                            index,
                            error: TransactionError::DoubleSpend(format!(
                                "{} also spent by transaction {first}",
                                hex::encode(id)
                            )),
                        });
                    }
                }
            }
            for coin in layer.output_coins() {
                let Some(record) = OutputRecord::from_coin(&layer.token_id, &coin) else {
                    continue;
                };
                for key in record.ota.into_iter().chain(record.snd) {
                    if let Some(first) = outputs.insert(key, index) {
                        if first != index {
                            return Err(BatchFailure {
                                index,
                                error: TransactionError::ReplayedOutput(format!(
                                    "{} also created by transaction {first}",
                                    hex::encode(key)
                                )),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LedgerDiff, MemoryChainState};
    use crate::transaction::{TX_VERSION_2, TxType};
    use obscura_privacy::operation::random_scalar;
    use obscura_privacy::{CoinV2, KeySet, PaymentInfo, Proof, ProofV2, TokenId};

    fn mint_to(ks: &KeySet, amount: u64) -> Transaction {
        let (coin, _) = CoinV2::derive(
            &PaymentInfo::new(ks.payment_address, amount),
            0,
            &random_scalar(),
            None,
            false,
        );
        Transaction {
            version: TX_VERSION_2,
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

    #[test]
    fn test_replay_detected_after_apply() {
        let tx = mint_to(&KeySet::random(), 5);
        let mut state = MemoryChainState::new();
        assert!(check_replay(&tx, &state).is_ok());

        let mut diff = LedgerDiff::new();
        diff.record_transaction(&tx, 0);
        state.apply(&diff);
        assert!(matches!(
            check_replay(&tx, &state),
            Err(TransactionError::ReplayedOutput(_))
        ));
    }

    #[test]
    fn test_block_uniqueness_reports_later_index() {
        let a = mint_to(&KeySet::random(), 5);
        let b = mint_to(&KeySet::random(), 6);
        assert!(check_block_uniqueness(&[a.clone(), b.clone()]).is_ok());

        let failure = check_block_uniqueness(&[a.clone(), b, a]).unwrap_err();
        assert_eq!(failure.index, 2);
        assert!(matches!(failure.error, TransactionError::ReplayedOutput(_)));
    }
}
