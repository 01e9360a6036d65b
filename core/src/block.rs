//! Blocks as the node receives them.
//!
//! A block mixes plain and token transactions; [`BlockTransaction`] lets the
//! verifier run both through one generic pipeline.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use obscura_privacy::{Proof, TokenId};
use obscura_transaction::{
    DeferredRange, LedgerDiff, ProofBearing, Signable, TokenCarrying, TokenData, TokenTransaction,
    Transaction, TxHash, Validatable, ValidationContext, ValidationEnvironment,
};
use serde::{Deserialize, Serialize};

type TxResult<T> = obscura_transaction::Result<T>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tx", rename_all = "snake_case")]
pub enum BlockTransaction {
    Plain(Transaction),
    Token(TokenTransaction),
}

impl From<Transaction> for BlockTransaction {
    fn from(tx: Transaction) -> Self {
        BlockTransaction::Plain(tx)
    }
}

impl From<TokenTransaction> for BlockTransaction {
    fn from(tx: TokenTransaction) -> Self {
        BlockTransaction::Token(tx)
    }
}

impl Signable for BlockTransaction {
    fn hash(&self) -> TxResult<TxHash> {
        match self {
            BlockTransaction::Plain(tx) => Signable::hash(tx),
            BlockTransaction::Token(tx) => Signable::hash(tx),
        }
    }
}

impl ProofBearing for BlockTransaction {
    fn proof(&self) -> &Proof {
        match self {
            BlockTransaction::Plain(tx) => ProofBearing::proof(tx),
            BlockTransaction::Token(tx) => ProofBearing::proof(tx),
        }
    }

    fn fee(&self) -> u64 {
        match self {
            BlockTransaction::Plain(tx) => ProofBearing::fee(tx),
            BlockTransaction::Token(tx) => ProofBearing::fee(tx),
        }
    }

    fn actual_size(&self) -> TxResult<usize> {
        match self {
            BlockTransaction::Plain(tx) => ProofBearing::actual_size(tx),
            BlockTransaction::Token(tx) => ProofBearing::actual_size(tx),
        }
    }

    fn layers(&self) -> Vec<&Transaction> {
        match self {
            BlockTransaction::Plain(tx) => tx.layers(),
            BlockTransaction::Token(tx) => tx.layers(),
        }
    }
}

impl TokenCarrying for BlockTransaction {
    fn token_id(&self) -> TokenId {
        match self {
            BlockTransaction::Plain(tx) => TokenCarrying::token_id(tx),
            BlockTransaction::Token(tx) => TokenCarrying::token_id(tx),
        }
    }

    fn token_data(&self) -> Option<&TokenData> {
        match self {
            BlockTransaction::Plain(_) => None,
            BlockTransaction::Token(tx) => tx.token_data(),
        }
    }
}

impl Validatable for BlockTransaction {
    fn sanity_check(&self, ctx: &ValidationContext<'_>) -> TxResult<()> {
        match self {
            BlockTransaction::Plain(tx) => tx.sanity_check(ctx),
            BlockTransaction::Token(tx) => tx.sanity_check(ctx),
        }
    }

    fn verify_deferring_range<'t>(
        &'t self,
        ctx: &ValidationContext<'_>,
    ) -> TxResult<Vec<DeferredRange<'t>>> {
        match self {
            BlockTransaction::Plain(tx) => tx.verify_deferring_range(ctx),
            BlockTransaction::Token(tx) => tx.verify_deferring_range(ctx),
        }
    }

    fn validate_against_chain(&self, ctx: &ValidationContext<'_>) -> TxResult<()> {
        match self {
            BlockTransaction::Plain(tx) => tx.validate_against_chain(ctx),
            BlockTransaction::Token(tx) => tx.validate_against_chain(ctx),
        }
    }

    fn record(&self, diff: &mut LedgerDiff, shard: u8) {
        match self {
            BlockTransaction::Plain(tx) => tx.record(diff, shard),
            BlockTransaction::Token(tx) => tx.record(diff, shard),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub shard_id: u8,
    pub height: u64,
    pub beacon_height: u64,
    /// Unix seconds
    pub timestamp: u64,
    pub transactions: Vec<BlockTransaction>,
}

impl Block {
    /// Read a JSON-encoded block.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read block: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse block: {}", path.display()))
    }

    /// Environment every transaction of this block is validated in.
    pub fn environment(&self) -> ValidationEnvironment {
        ValidationEnvironment::new(self.shard_id, self.timestamp)
            .with_heights(self.height, self.beacon_height)
            .replayed()
    }
}
