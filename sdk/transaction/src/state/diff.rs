//! Writes an accepted block makes to chain state.

use obscura_privacy::operation::scalar_to_bytes;
use obscura_privacy::{Coin, RingMember, TokenId, point_to_bytes};

use crate::state::{TokenInfo, ledger_token};
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentRecord {
    pub token_id: TokenId,
    pub shard: u8,
    /// Serial number or key image
    pub identifier: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub token_id: TokenId,
    pub shard: u8,
    pub version: u8,
    /// List entry: the commitment (v1) or the ring member encoding (v2)
    pub entry: Vec<u8>,
    pub commitment: [u8; 32],
    pub ota: Option<[u8; 32]>,
    pub snd: Option<[u8; 32]>,
}

impl OutputRecord {
    /// Record for a coin denominated in `token_id`; burned coins are never stored.
    pub fn from_coin(token_id: &TokenId, coin: &Coin) -> Option<Self> {
        if coin.is_burning() {
            return None;
        }
        let record = match coin {
            Coin::V1(c) => {
                let commitment = point_to_bytes(&c.commitment);
                Self {
                    token_id: ledger_token(token_id, 1),
                    shard: c.shard(),
                    version: 1,
                    entry: commitment.to_vec(),
                    commitment,
                    ota: None,
                    snd: Some(scalar_to_bytes(&c.snd)),
                }
            }
            Coin::V2(c) => Self {
                token_id: ledger_token(token_id, 2),
                shard: c.shard(),
                version: 2,
                entry: RingMember::from_coin(c).to_bytes(),
                commitment: point_to_bytes(&c.commitment),
                ota: Some(point_to_bytes(&c.public_key)),
                snd: None,
            },
        };
        Some(record)
    }
}

/// Everything one block adds to state, applied atomically by the writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDiff {
    pub spent: Vec<SpentRecord>,
    pub outputs: Vec<OutputRecord>,
    pub tokens: Vec<TokenInfo>,
}

impl LedgerDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the spends and outputs of `tx`, sent from `shard`.
    pub fn record_transaction(&mut self, tx: &Transaction, shard: u8) {
        let spent_token = tx.spend_ledger_token();
        for id in tx.proof.spent_identifiers() {
            self.spent.push(SpentRecord {
                token_id: spent_token,
                shard,
                identifier: point_to_bytes(&id),
            });
        }
        for coin in tx.output_coins() {
            if let Some(record) = OutputRecord::from_coin(&tx.token_id, &coin) {
                self.outputs.push(record);
            }
        }
    }

    pub fn record_token(&mut self, info: TokenInfo) {
        self.tokens.push(info);
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty() && self.outputs.is_empty() && self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_privacy::{BURNING_ADDRESS, CoinV1, CoinV2, KeySet, PaymentInfo};
    use obscura_privacy::operation::random_scalar;

    #[test]
    fn test_v2_token_coins_go_under_umbrella() {
        let token = TokenId([5; 32]);
        let ks = KeySet::random();
        let (coin, _) = CoinV2::derive(
            &PaymentInfo::new(ks.payment_address, 3),
            0,
            &random_scalar(),
            Some(&token),
            false,
        );
        let record = OutputRecord::from_coin(&token, &Coin::V2(coin.clone())).unwrap();
        assert_eq!(record.token_id, TokenId::CONFIDENTIAL_ASSET);
        assert_eq!(record.entry.len(), 96);
        assert_eq!(record.ota, Some(point_to_bytes(&coin.public_key)));
        assert_eq!(record.shard, coin.shard());
    }

    #[test]
    fn test_v1_record_carries_snd() {
        let ks = KeySet::random();
        let coin = CoinV1::new(&ks.payment_address, 3, Vec::new());
        let record = OutputRecord::from_coin(&TokenId::NATIVE, &Coin::V1(coin.clone())).unwrap();
        assert_eq!(record.entry, point_to_bytes(&coin.commitment).to_vec());
        assert_eq!(record.snd, Some(scalar_to_bytes(&coin.snd)));
        assert!(record.ota.is_none());
    }

    #[test]
    fn test_burned_coin_not_recorded() {
        let coin = CoinV1::new(&BURNING_ADDRESS, 3, Vec::new());
        assert!(OutputRecord::from_coin(&TokenId::NATIVE, &Coin::V1(coin)).is_none());
    }
}
