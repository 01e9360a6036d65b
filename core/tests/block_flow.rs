use obscura_core::{BlockTransaction, BlockWriter, RocksChainState, VerifierPool};
use obscura_privacy::operation::random_scalar;
use obscura_privacy::{Coin, CoinV2, KeySet, PaymentInfo, TokenId};
use obscura_transaction::{
    ChainState, LedgerDiff, PaymentRequest, Transaction, TransactionError, TxBuilder, TxParams,
    ValidationContext, ValidationEnvironment,
};
use obscura_transaction::state::OutputRecord;
use tempfile::TempDir;

const NOW: u64 = 1_700_000_000;
const SHARD: u8 = 5;

fn coin_on_shard(owner: &KeySet, amount: u64) -> CoinV2 {
    let payment = PaymentInfo::new(owner.payment_address, amount);
    loop {
        let (coin, _) = CoinV2::derive(&payment, 0, &random_scalar(), None, false);
        if coin.shard() == SHARD {
            return coin;
        }
    }
}

/// Write coins for `owner` plus strangers' decoys straight into the store.
fn fund(store: &RocksChainState, owner: &KeySet, amounts: &[u64]) -> Vec<CoinV2> {
    let coins: Vec<CoinV2> = amounts.iter().map(|&a| coin_on_shard(owner, a)).collect();
    let mut diff = LedgerDiff::new();
    let decoys = (0..10).map(|_| coin_on_shard(&KeySet::random(), 1));
    for coin in coins.iter().cloned().chain(decoys) {
        diff.outputs
            .extend(OutputRecord::from_coin(&TokenId::NATIVE, &Coin::V2(coin)));
    }
    store.write_diff(&diff).unwrap();
    coins
}

fn transfer(store: &RocksChainState, params: &TxParams, from: &KeySet, coin: &CoinV2) -> Transaction {
    let request = PaymentRequest::new(
        from,
        vec![PaymentInfo::new(KeySet::random().payment_address, 50)],
        5,
        NOW,
    );
    TxBuilder::new(store, params, SHARD)
        .build_v2(&request, std::slice::from_ref(coin))
        .unwrap()
        .sign()
        .unwrap()
}

fn context<'a>(store: &'a RocksChainState, params: &'a TxParams) -> ValidationContext<'a> {
    ValidationContext::new(ValidationEnvironment::new(SHARD, NOW), store, params)
}

#[test]
fn block_is_verified_and_committed() {
    let dir = TempDir::new().unwrap();
    let store = RocksChainState::open(dir.path()).unwrap();
    let params = TxParams::default();
    let sender = KeySet::random_in_shard(SHARD);
    let coins = fund(&store, &sender, &[100, 200, 300]);
    let before = store
        .get_commitment_or_ota_length(&TokenId::NATIVE, SHARD, 2)
        .unwrap();

    let txs: Vec<BlockTransaction> = coins
        .iter()
        .map(|coin| transfer(&store, &params, &sender, coin).into())
        .collect();
    let pool = VerifierPool::new(2, 2).unwrap();
    let accepted = pool.verify_block(txs, &context(&store, &params)).unwrap();
    assert_eq!(accepted.len(), 3);

    let diff = BlockWriter::new(&store, SHARD).apply(&accepted).unwrap();
    assert_eq!(diff.spent.len(), 3);
    // recipient and change per transfer
    assert_eq!(diff.outputs.len(), 6);
    let on_shard = diff.outputs.iter().filter(|o| o.shard == SHARD).count() as u64;
    assert_eq!(
        store
            .get_commitment_or_ota_length(&TokenId::NATIVE, SHARD, 2)
            .unwrap(),
        before + on_shard
    );
}

#[test]
fn committed_spend_cannot_be_replayed() {
    let dir = TempDir::new().unwrap();
    let store = RocksChainState::open(dir.path()).unwrap();
    let params = TxParams::default();
    let sender = KeySet::random_in_shard(SHARD);
    let coins = fund(&store, &sender, &[100]);
    let pool = VerifierPool::new(1, 8).unwrap();

    let first = transfer(&store, &params, &sender, &coins[0]);
    let accepted = pool
        .verify_block(vec![BlockTransaction::from(first)], &context(&store, &params))
        .unwrap();
    BlockWriter::new(&store, SHARD).apply(&accepted).unwrap();

    let again = transfer(&store, &params, &sender, &coins[0]);
    let failure = pool
        .verify_block(vec![BlockTransaction::from(again)], &context(&store, &params))
        .err()
        .unwrap();
    assert_eq!(failure.index, 0);
    assert!(matches!(failure.error, TransactionError::DoubleSpend(_)));
}

#[test]
fn block_spending_one_coin_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = RocksChainState::open(dir.path()).unwrap();
    let params = TxParams::default();
    let sender = KeySet::random_in_shard(SHARD);
    let coins = fund(&store, &sender, &[100, 100]);

    let txs: Vec<BlockTransaction> = vec![
        transfer(&store, &params, &sender, &coins[0]).into(),
        transfer(&store, &params, &sender, &coins[1]).into(),
        transfer(&store, &params, &sender, &coins[0]).into(),
    ];
    let failure = VerifierPool::new(2, 1)
        .unwrap()
        .verify_block(txs, &context(&store, &params))
        .err()
        .unwrap();
    assert_eq!(failure.index, 2);
    assert!(matches!(failure.error, TransactionError::DoubleSpend(_)));
}
