//! Ring sampling and ring resolution.
//!
//! ```text
//! v1: one ring of RING_SIZE commitments per input, real coin at a random slot
//! v2: ring_size rows × inputs, the real inputs form row pi
//! ```
//!
//! Decoys are drawn uniformly from `[0, persisted length)` without
//! replacement and never coincide with a real input. The verifier rebuilds
//! the same rings from the recorded indices.

use std::collections::HashSet;

use obscura_privacy::coin::CoinV1;
use obscura_privacy::one_out_of_many::RING_SIZE;
use obscura_privacy::proof::{InputV1, RingV2};
use obscura_privacy::{CoinV2, Mlsag, Point, RingMember, TokenId, point_from_bytes, point_to_bytes};
use rand::Rng;
use rand::rngs::OsRng;
use tracing::debug;

use crate::errors::{Result, TransactionError};
use crate::state::{ChainState, ledger_token};

struct DecoyPicker {
    len: u64,
    taken: HashSet<u64>,
}

impl DecoyPicker {
    fn new(len: u64, real: &[u64]) -> Self {
        Self {
            len,
            taken: real.iter().copied().collect(),
        }
    }

    /// Only called while fewer than `len` indices are taken.
    fn draw(&mut self) -> u64 {
        loop {
            let candidate = OsRng.gen_range(0..self.len);
            if self.taken.insert(candidate) {
                return candidate;
            }
        }
    }
}

fn check_pool(have: u64, ring_size: usize, inputs: usize) -> Result<()> {
    let need = (ring_size as u64).saturating_mul(inputs as u64);
    if have < need {
        return Err(TransactionError::InsufficientRingMembers { need, have });
    }
    Ok(())
}

fn entry(state: &dyn ChainState, token_id: &TokenId, index: u64, shard: u8, version: u8) -> Result<Vec<u8>> {
    state
        .get_commitment_or_ota_by_index(token_id, index, shard, version)
        .map_err(TransactionError::state)?
        .ok_or(TransactionError::MissingRingMember {
            token_id: *token_id,
            index,
        })
}

/// Sample a v1 ring for every coin being spent from `shard`.
pub fn sample_v1_rings(
    state: &dyn ChainState,
    token_id: &TokenId,
    shard: u8,
    coins: &[CoinV1],
) -> Result<Vec<InputV1>> {
    let token = ledger_token(token_id, 1);
    let len = state
        .get_commitment_or_ota_length(&token, shard, 1)
        .map_err(TransactionError::state)?;
    check_pool(len, RING_SIZE, coins.len())?;

    let mut real = Vec::with_capacity(coins.len());
    for coin in coins {
        let index = state
            .get_commitment_index(&token, &point_to_bytes(&coin.commitment), shard)
            .map_err(TransactionError::state)?
            .ok_or(TransactionError::RandomCommitment)?;
        real.push(index);
    }

    let mut picker = DecoyPicker::new(len, &real);
    let mut inputs = Vec::with_capacity(coins.len());
    for (coin, real_index) in coins.iter().zip(&real) {
        let position = OsRng.gen_range(0..RING_SIZE);
        let mut ring = Vec::with_capacity(RING_SIZE);
        let mut ring_indices = Vec::with_capacity(RING_SIZE);
        for slot in 0..RING_SIZE {
            if slot == position {
                ring.push(coin.commitment);
                ring_indices.push(*real_index);
                continue;
            }
            let index = picker.draw();
            ring.push(point_from_bytes(&entry(state, &token, index, shard, 1)?)?);
            ring_indices.push(index);
        }
        inputs.push(InputV1 {
            coin: coin.clone(),
            ring,
            ring_indices,
            position,
        });
    }
    debug!(inputs = coins.len(), pool = len, "sampled v1 rings");
    Ok(inputs)
}

/// Sample a v2 ring of `ring_size` rows around the coins being spent from `shard`.
pub fn sample_v2_ring(
    state: &dyn ChainState,
    token_id: &TokenId,
    shard: u8,
    coins: &[CoinV2],
    ring_size: usize,
) -> Result<RingV2> {
    if ring_size == 0 || coins.is_empty() {
        return Err(TransactionError::MalformedRing(
            "ring needs at least one row and one input".into(),
        ));
    }
    let token = ledger_token(token_id, 2);
    let len = state
        .get_commitment_or_ota_length(&token, shard, 2)
        .map_err(TransactionError::state)?;
    check_pool(len, ring_size, coins.len())?;

    let mut real = Vec::with_capacity(coins.len());
    for coin in coins {
        let index = state
            .get_ota_index(&token, &point_to_bytes(&coin.public_key), shard)
            .map_err(TransactionError::state)?
            .ok_or(TransactionError::RandomCommitment)?;
        real.push(index);
    }

    let pi = Mlsag::random_position(ring_size);
    let mut picker = DecoyPicker::new(len, &real);
    let mut members = Vec::with_capacity(ring_size);
    let mut indices = Vec::with_capacity(ring_size);
    for row in 0..ring_size {
        if row == pi {
            members.push(coins.iter().map(RingMember::from_coin).collect());
            indices.push(real.clone());
            continue;
        }
        let mut row_members = Vec::with_capacity(coins.len());
        let mut row_indices = Vec::with_capacity(coins.len());
        for _ in coins {
            let index = picker.draw();
            row_members.push(RingMember::from_bytes(&entry(state, &token, index, shard, 2)?)?);
            row_indices.push(index);
        }
        members.push(row_members);
        indices.push(row_indices);
    }
    debug!(rows = ring_size, inputs = coins.len(), pool = len, "sampled v2 ring");
    Ok(RingV2 {
        members,
        indices,
        pi,
    })
}

/// Commitments behind the recorded v1 ring indices.
pub fn resolve_v1_rings(
    state: &dyn ChainState,
    token_id: &TokenId,
    shard: u8,
    indices: &[Vec<u64>],
) -> Result<Vec<Vec<Point>>> {
    let token = ledger_token(token_id, 1);
    indices
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|index| {
                    let bytes = entry(state, &token, *index, shard, 1)?;
                    point_from_bytes(&bytes).map_err(|e| TransactionError::MalformedRing(e.to_string()))
                })
                .collect()
        })
        .collect()
}

/// Ring members behind the recorded v2 ring indices.
pub fn resolve_v2_ring(
    state: &dyn ChainState,
    token_id: &TokenId,
    shard: u8,
    indices: &[Vec<u64>],
) -> Result<Vec<Vec<RingMember>>> {
    let token = ledger_token(token_id, 2);
    indices
        .iter()
        .map(|row| {
            row.iter()
                .map(|index| {
                    let bytes = entry(state, &token, *index, shard, 2)?;
                    RingMember::from_bytes(&bytes).map_err(|e| TransactionError::MalformedRing(e.to_string()))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryChainState;
    use obscura_privacy::operation::random_scalar;
    use obscura_privacy::{Coin, KeySet, PaymentInfo};

    fn v1_pool(state: &mut MemoryChainState, owner: &KeySet, count: usize) -> Vec<CoinV1> {
        (0..count)
            .map(|i| {
                let coin = CoinV1::new(&owner.payment_address, 10 + i as u64, Vec::new());
                state.store_coin(&TokenId::NATIVE, &Coin::V1(coin.clone()));
                coin
            })
            .collect()
    }

    fn v2_pool(state: &mut MemoryChainState, owner: &KeySet, count: usize) -> Vec<CoinV2> {
        let mut coins = Vec::new();
        while coins.len() < count {
            let (coin, _) = CoinV2::derive(
                &PaymentInfo::new(owner.payment_address, 5),
                0,
                &random_scalar(),
                None,
                false,
            );
            if coin.shard() != owner.shard() {
                continue;
            }
            state.store_coin(&TokenId::NATIVE, &Coin::V2(coin.clone()));
            coins.push(coin);
        }
        coins
    }

    #[test]
    fn test_v1_rings_hold_real_coin_and_distinct_decoys() {
        let mut state = MemoryChainState::new();
        let owner = KeySet::random();
        let coins = v1_pool(&mut state, &owner, 20);
        let spent = vec![coins[3].clone(), coins[11].clone()];

        let inputs = sample_v1_rings(&state, &TokenId::NATIVE, owner.shard(), &spent).unwrap();
        let mut seen = HashSet::new();
        for (input, coin) in inputs.iter().zip(&spent) {
            assert_eq!(input.ring[input.position], coin.commitment);
            for (slot, index) in input.ring_indices.iter().enumerate() {
                if slot != input.position {
                    assert!(seen.insert(*index));
                    assert!(*index != 3 && *index != 11);
                }
            }
        }

        let indices: Vec<Vec<u64>> = inputs.iter().map(|i| i.ring_indices.clone()).collect();
        let resolved = resolve_v1_rings(&state, &TokenId::NATIVE, owner.shard(), &indices).unwrap();
        let sampled: Vec<Vec<Point>> = inputs.iter().map(|i| i.ring.clone()).collect();
        assert_eq!(resolved, sampled);
    }

    #[test]
    fn test_small_pool_rejected() {
        let mut state = MemoryChainState::new();
        let owner = KeySet::random();
        let coins = v1_pool(&mut state, &owner, 7);
        assert_eq!(
            sample_v1_rings(&state, &TokenId::NATIVE, owner.shard(), &coins[..1]).unwrap_err(),
            TransactionError::InsufficientRingMembers { need: 8, have: 7 }
        );
    }

    #[test]
    fn test_unpersisted_coin_rejected() {
        let mut state = MemoryChainState::new();
        let owner = KeySet::random();
        v1_pool(&mut state, &owner, 10);
        let fresh = CoinV1::new(&owner.payment_address, 1, Vec::new());
        assert_eq!(
            sample_v1_rings(&state, &TokenId::NATIVE, owner.shard(), &[fresh]).unwrap_err(),
            TransactionError::RandomCommitment
        );
    }

    #[test]
    fn test_v2_ring_rows() {
        let mut state = MemoryChainState::new();
        let owner = KeySet::random();
        let coins = v2_pool(&mut state, &owner, 12);
        let spent = vec![coins[0].clone(), coins[5].clone()];

        let ring = sample_v2_ring(&state, &TokenId::NATIVE, owner.shard(), &spent, 4).unwrap();
        assert_eq!(ring.members.len(), 4);
        assert_eq!(ring.indices[ring.pi], vec![0, 5]);
        assert_eq!(ring.members[ring.pi][1], RingMember::from_coin(&coins[5]));

        let resolved = resolve_v2_ring(&state, &TokenId::NATIVE, owner.shard(), &ring.indices).unwrap();
        assert_eq!(resolved, ring.members);
    }

    #[test]
    fn test_missing_ring_member() {
        let state = MemoryChainState::new();
        let err = resolve_v2_ring(&state, &TokenId::NATIVE, 0, &[vec![4]]).unwrap_err();
        assert!(matches!(err, TransactionError::MissingRingMember { index: 4, .. }));
    }
}
