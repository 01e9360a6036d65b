#![allow(dead_code)]

use obscura_privacy::operation::random_scalar;
use obscura_privacy::{Coin, CoinV1, CoinV2, KeySet, PaymentInfo, TokenId};
use obscura_transaction::{MemoryChainState, TxParams, ValidationContext, ValidationEnvironment};

pub const NOW: u64 = 1_700_000_000;
pub const SHARD: u8 = 2;

/// A v2 coin paying `owner`, with its one-time address on `shard`.
pub fn v2_coin(owner: &KeySet, amount: u64, token: Option<&TokenId>, shard: u8) -> CoinV2 {
    let payment = PaymentInfo::new(owner.payment_address, amount);
    loop {
        let (coin, _) = CoinV2::derive(&payment, 0, &random_scalar(), token, token.is_some());
        if coin.shard() == shard {
            return coin;
        }
    }
}

/// Persist native v2 coins for `owner` and return them, ready to spend.
pub fn fund_v2(state: &mut MemoryChainState, owner: &KeySet, amounts: &[u64]) -> Vec<CoinV2> {
    amounts
        .iter()
        .map(|&amount| {
            let coin = v2_coin(owner, amount, None, owner.shard());
            state.store_coin(&TokenId::NATIVE, &Coin::V2(coin.clone()));
            coin
        })
        .collect()
}

pub fn fund_v1(state: &mut MemoryChainState, owner: &KeySet, amounts: &[u64]) -> Vec<CoinV1> {
    amounts
        .iter()
        .map(|&amount| {
            let coin = CoinV1::new(&owner.payment_address, amount, Vec::new());
            state.store_coin(&TokenId::NATIVE, &Coin::V1(coin.clone()));
            coin
        })
        .collect()
}

/// Fill the v2 pool of `token` on `shard` with coins owned by strangers.
pub fn seed_v2_decoys(state: &mut MemoryChainState, token: &TokenId, shard: u8, count: usize) {
    let asset = (!token.is_native()).then_some(token);
    for _ in 0..count {
        let coin = v2_coin(&KeySet::random(), 1, asset, shard);
        state.store_coin(token, &Coin::V2(coin));
    }
}

pub fn seed_v1_decoys(state: &mut MemoryChainState, token: &TokenId, shard: u8, count: usize) {
    for _ in 0..count {
        let coin = CoinV1::new(&KeySet::random_in_shard(shard).payment_address, 1, Vec::new());
        state.store_coin(token, &Coin::V1(coin));
    }
}

pub fn context<'a>(state: &'a MemoryChainState, params: &'a TxParams) -> ValidationContext<'a> {
    ValidationContext::new(ValidationEnvironment::new(SHARD, NOW), state, params)
}
