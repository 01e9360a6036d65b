mod common;

use common::*;
use obscura_privacy::{KeySet, PaymentInfo, TokenId};
use obscura_transaction::{
    MemoryChainState, PaymentRequest, Transaction, TransactionError, TxBuilder, TxParams,
    Unvalidated, Validatable, batch_validate, check_block_uniqueness, validate_batch,
};

struct Fixture {
    state: MemoryChainState,
    params: TxParams,
    senders: Vec<KeySet>,
}

impl Fixture {
    fn new(transactions: usize) -> Self {
        let mut state = MemoryChainState::new();
        let senders: Vec<KeySet> = (0..transactions)
            .map(|_| KeySet::random_in_shard(SHARD))
            .collect();
        seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
        seed_v1_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
        Self {
            state,
            params: TxParams::default(),
            senders,
        }
    }

    /// Alternating v2 and v1 transfers, one per sender.
    fn transactions(&mut self) -> Vec<Transaction> {
        let mut coins_v2 = Vec::new();
        let mut coins_v1 = Vec::new();
        for sender in &self.senders {
            coins_v2.push(fund_v2(&mut self.state, sender, &[100]));
            coins_v1.push(fund_v1(&mut self.state, sender, &[100]));
        }
        let builder = TxBuilder::new(&self.state, &self.params, SHARD);
        self.senders
            .iter()
            .enumerate()
            .map(|(i, sender)| {
                let request = PaymentRequest::new(
                    sender,
                    vec![PaymentInfo::new(KeySet::random().payment_address, 60)],
                    4,
                    NOW,
                );
                let unsigned = if i % 2 == 0 {
                    builder.build_v2(&request, &coins_v2[i])
                } else {
                    builder.build_v1(&request, &coins_v1[i])
                };
                unsigned.unwrap().sign().unwrap()
            })
            .collect()
    }
}

#[test]
fn batch_agrees_with_one_by_one() {
    let mut fixture = Fixture::new(4);
    let txs = fixture.transactions();
    let ctx = context(&fixture.state, &fixture.params);

    for tx in &txs {
        assert!(tx.validate_by_itself(&ctx).is_ok());
    }
    assert!(batch_validate(&txs, &ctx).is_ok());

    let checked = txs
        .into_iter()
        .map(|tx| Unvalidated::new(tx).sanity_check(&ctx).ok().unwrap())
        .collect();
    let validated = validate_batch(checked, &ctx).ok().unwrap();
    assert_eq!(validated.len(), 4);
    for tx in validated {
        assert!(tx.validate_against_chain(&ctx).is_ok());
    }
}

#[test]
fn batch_reports_lowest_failing_index() {
    let mut fixture = Fixture::new(5);
    let mut txs = fixture.transactions();
    txs[3].lock_time -= 1;
    txs[1].fee += 1;
    let ctx = context(&fixture.state, &fixture.params);

    let failure = batch_validate(&txs, &ctx).unwrap_err();
    assert_eq!(failure.index, 1);
    assert_eq!(
        failure.error,
        txs[1].validate_by_itself(&ctx).unwrap_err()
    );
    assert!(txs[3].validate_by_itself(&ctx).is_err());
}

#[test]
fn block_with_shared_spend_is_rejected() {
    let mut fixture = Fixture::new(2);
    let txs = fixture.transactions();
    assert!(check_block_uniqueness(&txs).is_ok());

    let sender = KeySet::random_in_shard(SHARD);
    let coins = fund_v2(&mut fixture.state, &sender, &[30]);
    let builder = TxBuilder::new(&fixture.state, &fixture.params, SHARD);
    let request = PaymentRequest::new(
        &sender,
        vec![PaymentInfo::new(KeySet::random().payment_address, 10)],
        0,
        NOW,
    );
    // same coin, same key image
    let a = builder.build_v2(&request, &coins).unwrap().sign().unwrap();
    let b = builder.build_v2(&request, &coins).unwrap().sign().unwrap();

    let failure = check_block_uniqueness(&[txs[0].clone(), a, b]).unwrap_err();
    assert_eq!(failure.index, 2);
    assert!(matches!(failure.error, TransactionError::DoubleSpend(_)));
}
