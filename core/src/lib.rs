//! Obscura node.
//!
//! ```text
//!   block.json ──► Block ──► VerifierPool ──► Accepted<BlockTransaction> ──► BlockWriter
//!                                 │                                              │
//!                                 └────────── RocksChainState (reads) ◄──────────┘ (WriteBatch)
//! ```

pub mod block;
pub mod storage;
pub mod verifier;

use obscura_config::ObscuraConfig;
use obscura_transaction::{TxParams, ValidationEnvironment};

pub use block::{Block, BlockTransaction};
pub use storage::{BlockWriter, RocksChainState};
pub use verifier::VerifierPool;

/// Transaction limits as configured.
pub fn tx_params(config: &ObscuraConfig) -> TxParams {
    TxParams {
        ring_size: config.privacy.ring_size,
        max_ota_attempts: config.privacy.max_ota_attempts,
        max_tx_size: config.validation.max_tx_size,
        max_info_size: config.validation.max_info_size,
        max_lock_time_drift_secs: config.validation.max_lock_time_drift_secs,
    }
}

/// Environment for `block`, with the legacy ring carve-out if configured.
pub fn block_environment(block: &Block, config: &ObscuraConfig) -> ValidationEnvironment {
    let env = block.environment();
    if config.validation.legacy_mode {
        env.with_legacy_cutoff(config.validation.legacy_cutoff)
    } else {
        env
    }
}
