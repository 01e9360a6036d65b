use std::env;
use std::path::PathBuf;

use anyhow::{Context, bail};
use obscura_config::ObscuraConfig;
use obscura_core::{Block, BlockWriter, RocksChainState, VerifierPool, block_environment, tx_params};
use obscura_transaction::ValidationContext;
use tracing::{error, info, info_span};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ObscuraConfig::global();
    let block_path: PathBuf = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: obscura-core <block.json>")?;

    let block = Block::load(&block_path)?;
    info!(
        shard = block.shard_id,
        height = block.height,
        transactions = block.transactions.len(),
        "Block loaded"
    );

    let store = RocksChainState::open(&config.database.path)?;
    let params = tx_params(config);
    let env = block_environment(&block, config);
    let span = info_span!("block", shard = block.shard_id, height = block.height);
    let ctx = ValidationContext::new(env, &store, &params).with_span(span);

    let pool = VerifierPool::new(config.verifier.threads, config.verifier.batch_size)?;
    let accepted = match pool.verify_block(block.transactions, &ctx) {
        Ok(accepted) => accepted,
        Err(failure) => {
            error!(index = failure.index, error = %failure.error, "Block rejected");
            bail!(failure);
        }
    };

    let diff = BlockWriter::new(&store, block.shard_id).apply(&accepted)?;
    info!(
        accepted = accepted.len(),
        outputs = diff.outputs.len(),
        "Block committed"
    );
    Ok(())
}
