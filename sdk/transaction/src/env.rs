//! Context that verification needs but a transaction does not own.

use obscura_privacy::generators::MAX_AGGREGATED_OUTPUTS;
use serde::{Deserialize, Serialize};

use crate::transaction::TxType;

/// Largest serialized transaction accepted
pub const DEFAULT_MAX_TX_SIZE: usize = 512 * 1024;
/// Largest `info` field accepted
pub const DEFAULT_MAX_INFO_SIZE: usize = 512;
/// How far a lock time may run ahead of the confirmation time
pub const DEFAULT_MAX_LOCK_TIME_DRIFT_SECS: u64 = 3600;
/// v2 ring rows
pub const DEFAULT_RING_SIZE: usize = 8;
/// Candidate one-time addresses tried per output
pub const DEFAULT_MAX_OTA_ATTEMPTS: usize = 512;
/// Most outputs a transaction may create; one aggregated range proof covers them all
pub const MAX_OUTPUTS: usize = MAX_AGGREGATED_OUTPUTS;

/// Block-level context a transaction is validated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEnvironment {
    pub shard_id: u8,
    pub shard_height: u64,
    pub beacon_height: u64,
    /// Unix seconds of the block confirming the transaction
    pub confirmation_time: u64,
    pub has_privacy: bool,
    pub tx_type: TxType,
    /// Set for transactions built locally rather than replayed from a block
    pub is_new_transaction: bool,
    pub legacy_mode: bool,
    pub legacy_cutoff: u64,
}

impl ValidationEnvironment {
    pub fn new(shard_id: u8, confirmation_time: u64) -> Self {
        Self {
            shard_id,
            shard_height: 0,
            beacon_height: 0,
            confirmation_time,
            has_privacy: true,
            tx_type: TxType::Normal,
            is_new_transaction: true,
            legacy_mode: false,
            legacy_cutoff: 0,
        }
    }

    pub fn with_heights(mut self, shard_height: u64, beacon_height: u64) -> Self {
        self.shard_height = shard_height;
        self.beacon_height = beacon_height;
        self
    }

    /// Replaying historical blocks: tolerate v1 ring failures up to `cutoff`.
    pub fn with_legacy_cutoff(mut self, cutoff: u64) -> Self {
        self.legacy_mode = true;
        self.legacy_cutoff = cutoff;
        self.is_new_transaction = false;
        self
    }

    pub fn replayed(mut self) -> Self {
        self.is_new_transaction = false;
        self
    }

    /// Copy of this environment describing one transaction.
    pub fn for_transaction(&self, tx_type: TxType, has_privacy: bool) -> Self {
        Self {
            tx_type,
            has_privacy,
            ..self.clone()
        }
    }

    /// Whether a failed v1 ring proof is tolerated for a transaction with `lock_time`.
    pub fn allows_ring_failure(&self, lock_time: u64) -> bool {
        self.legacy_mode && !self.is_new_transaction && lock_time <= self.legacy_cutoff
    }
}

/// Limits and knobs for building and validating transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    pub ring_size: usize,
    pub max_ota_attempts: usize,
    pub max_tx_size: usize,
    pub max_info_size: usize,
    pub max_lock_time_drift_secs: u64,
}

impl Default for TxParams {
    fn default() -> Self {
        Self {
            ring_size: DEFAULT_RING_SIZE,
            max_ota_attempts: DEFAULT_MAX_OTA_ATTEMPTS,
            max_tx_size: DEFAULT_MAX_TX_SIZE,
            max_info_size: DEFAULT_MAX_INFO_SIZE,
            max_lock_time_drift_secs: DEFAULT_MAX_LOCK_TIME_DRIFT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_failure_needs_every_condition() {
        let env = ValidationEnvironment::new(0, 1_000);
        assert!(!env.allows_ring_failure(0));

        let legacy = env.clone().with_legacy_cutoff(500);
        assert!(legacy.allows_ring_failure(500));
        assert!(!legacy.allows_ring_failure(501));

        let mut fresh = legacy.clone();
        fresh.is_new_transaction = true;
        assert!(!fresh.allows_ring_failure(10));
    }

    #[test]
    fn test_for_transaction_keeps_block_fields() {
        let env = ValidationEnvironment::new(3, 42).with_heights(10, 20);
        let tx_env = env.for_transaction(TxType::Mint, false);
        assert_eq!(tx_env.shard_id, 3);
        assert_eq!(tx_env.beacon_height, 20);
        assert_eq!(tx_env.tx_type, TxType::Mint);
        assert!(!tx_env.has_privacy);
    }
}
