//! Read-only view of persisted chain state.
//!
//! Coins are kept in per-(token, shard, version) lists so a ring is always
//! sampled from one coin format. Version-2 token coins all live under the
//! [`TokenId::CONFIDENTIAL_ASSET`] umbrella, which is what lets their rings mix
//! tokens.

pub mod diff;
pub mod memory;

use anyhow::Result;
use obscura_privacy::TokenId;
use serde::{Deserialize, Serialize};

pub use diff::{LedgerDiff, OutputRecord, SpentRecord};
pub use memory::MemoryChainState;

/// A token the chain knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub amount: u64,
    pub mintable: bool,
}

/// Lookups the transaction layer needs from storage.
///
/// Implementations must be safe to share across verifier threads. Every key
/// is the 32-byte compressed encoding of the point or scalar involved.
pub trait ChainState: Send + Sync {
    fn has_serial_number(&self, token_id: &TokenId, serial: &[u8; 32], shard: u8) -> Result<bool>;

    /// Whether a v1 coin commitment is persisted.
    fn has_commitment(&self, token_id: &TokenId, commitment: &[u8; 32], shard: u8) -> Result<bool>;

    fn has_one_time_address(&self, token_id: &TokenId, ota: &[u8; 32], shard: u8) -> Result<bool>;

    /// Whether a v1 serial-number derivator was already used by an output.
    fn has_snd(&self, token_id: &TokenId, snd: &[u8; 32], shard: u8) -> Result<bool>;

    /// Entry `index` of the coin list: a v1 commitment or a v2 ring member.
    fn get_commitment_or_ota_by_index(
        &self,
        token_id: &TokenId,
        index: u64,
        shard: u8,
        version: u8,
    ) -> Result<Option<Vec<u8>>>;

    fn get_commitment_or_ota_length(&self, token_id: &TokenId, shard: u8, version: u8) -> Result<u64>;

    fn get_commitment_index(&self, token_id: &TokenId, commitment: &[u8; 32], shard: u8) -> Result<Option<u64>>;

    fn get_ota_index(&self, token_id: &TokenId, ota: &[u8; 32], shard: u8) -> Result<Option<u64>>;

    fn token_id_exists(&self, token_id: &TokenId) -> Result<bool>;

    fn get_all_bridge_tokens(&self) -> Result<Vec<TokenInfo>>;
}

/// Token id a coin of `version` is stored under.
pub fn ledger_token(token_id: &TokenId, version: u8) -> TokenId {
    if version >= 2 && !token_id.is_native() {
        TokenId::CONFIDENTIAL_ASSET
    } else {
        *token_id
    }
}
