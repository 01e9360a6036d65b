use std::collections::{HashMap, HashSet};

use anyhow::Result;
use obscura_privacy::{Coin, TokenId};

use crate::state::{ChainState, LedgerDiff, OutputRecord, TokenInfo};

type Key = (TokenId, u8, [u8; 32]);

/// In-memory chain state.
/// Used by wallets in tests and by anything that replays a handful of blocks.
#[derive(Debug, Default, Clone)]
pub struct MemoryChainState {
    serial_numbers: HashSet<Key>,
    snds: HashSet<Key>,
    commitment_index: HashMap<Key, u64>,
    ota_index: HashMap<Key, u64>,
    lists: HashMap<(TokenId, u8, u8), Vec<Vec<u8>>>,
    tokens: HashMap<TokenId, TokenInfo>,
    bridge_tokens: Vec<TokenInfo>,
}

impl MemoryChainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a coin as if an accepted block had created it.
    pub fn store_coin(&mut self, token_id: &TokenId, coin: &Coin) {
        if let Some(record) = OutputRecord::from_coin(token_id, coin) {
            self.store_output(&record);
        }
    }

    fn store_output(&mut self, record: &OutputRecord) {
        let list = self
            .lists
            .entry((record.token_id, record.shard, record.version))
            .or_default();
        let index = list.len() as u64;
        list.push(record.entry.clone());

        let key = |bytes: [u8; 32]| (record.token_id, record.shard, bytes);
        match record.ota {
            Some(ota) => {
                self.ota_index.insert(key(ota), index);
            }
            None => {
                self.commitment_index.insert(key(record.commitment), index);
            }
        }
        if let Some(snd) = record.snd {
            self.snds.insert(key(snd));
        }
    }

    pub fn register_bridge_token(&mut self, info: TokenInfo) {
        self.bridge_tokens.push(info);
    }

    pub fn apply(&mut self, diff: &LedgerDiff) {
        for spent in &diff.spent {
            self.serial_numbers
                .insert((spent.token_id, spent.shard, spent.identifier));
        }
        for output in &diff.outputs {
            self.store_output(output);
        }
        for token in &diff.tokens {
            self.tokens.insert(token.token_id, token.clone());
        }
    }
}

impl ChainState for MemoryChainState {
    fn has_serial_number(&self, token_id: &TokenId, serial: &[u8; 32], shard: u8) -> Result<bool> {
        Ok(self.serial_numbers.contains(&(*token_id, shard, *serial)))
    }

    fn has_commitment(&self, token_id: &TokenId, commitment: &[u8; 32], shard: u8) -> Result<bool> {
        Ok(self
            .commitment_index
            .contains_key(&(*token_id, shard, *commitment)))
    }

    fn has_one_time_address(&self, token_id: &TokenId, ota: &[u8; 32], shard: u8) -> Result<bool> {
        Ok(self.ota_index.contains_key(&(*token_id, shard, *ota)))
    }

    fn has_snd(&self, token_id: &TokenId, snd: &[u8; 32], shard: u8) -> Result<bool> {
        Ok(self.snds.contains(&(*token_id, shard, *snd)))
    }

    fn get_commitment_or_ota_by_index(
        &self,
        token_id: &TokenId,
        index: u64,
        shard: u8,
        version: u8,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .lists
            .get(&(*token_id, shard, version))
            .and_then(|list| usize::try_from(index).ok().and_then(|i| list.get(i)))
            .cloned())
    }

    fn get_commitment_or_ota_length(&self, token_id: &TokenId, shard: u8, version: u8) -> Result<u64> {
        Ok(self
            .lists
            .get(&(*token_id, shard, version))
            .map_or(0, |list| list.len() as u64))
    }

    fn get_commitment_index(&self, token_id: &TokenId, commitment: &[u8; 32], shard: u8) -> Result<Option<u64>> {
        Ok(self
            .commitment_index
            .get(&(*token_id, shard, *commitment))
            .copied())
    }

    fn get_ota_index(&self, token_id: &TokenId, ota: &[u8; 32], shard: u8) -> Result<Option<u64>> {
        Ok(self.ota_index.get(&(*token_id, shard, *ota)).copied())
    }

    fn token_id_exists(&self, token_id: &TokenId) -> Result<bool> {
        Ok(self.tokens.contains_key(token_id))
    }

    fn get_all_bridge_tokens(&self) -> Result<Vec<TokenInfo>> {
        Ok(self.bridge_tokens.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SpentRecord;
    use obscura_privacy::{CoinV1, KeySet, point_to_bytes};

    #[test]
    fn test_store_and_lookup_v1() {
        let mut state = MemoryChainState::new();
        let ks = KeySet::random();
        let coin = CoinV1::new(&ks.payment_address, 10, Vec::new());
        let shard = coin.shard();
        state.store_coin(&TokenId::NATIVE, &Coin::V1(coin.clone()));

        let c = point_to_bytes(&coin.commitment);
        assert!(state.has_commitment(&TokenId::NATIVE, &c, shard).unwrap());
        assert_eq!(
            state.get_commitment_index(&TokenId::NATIVE, &c, shard).unwrap(),
            Some(0)
        );
        assert_eq!(
            state.get_commitment_or_ota_length(&TokenId::NATIVE, shard, 1).unwrap(),
            1
        );
        assert_eq!(
            state
                .get_commitment_or_ota_by_index(&TokenId::NATIVE, 0, shard, 1)
                .unwrap(),
            Some(c.to_vec())
        );
        assert_eq!(
            state.get_commitment_or_ota_length(&TokenId::NATIVE, shard, 2).unwrap(),
            0
        );
    }

    #[test]
    fn test_apply_records_spends_and_tokens() {
        let mut state = MemoryChainState::new();
        let token = TokenId([3; 32]);
        let mut diff = LedgerDiff::new();
        diff.spent.push(SpentRecord {
            token_id: TokenId::NATIVE,
            shard: 2,
            identifier: [8; 32],
        });
        diff.record_token(TokenInfo {
            token_id: token,
            name: "Gold".into(),
            symbol: "GLD".into(),
            amount: 100,
            mintable: false,
        });
        state.apply(&diff);

        assert!(state.has_serial_number(&TokenId::NATIVE, &[8; 32], 2).unwrap());
        assert!(!state.has_serial_number(&TokenId::NATIVE, &[8; 32], 3).unwrap());
        assert!(state.token_id_exists(&token).unwrap());
    }
}
