//! Obscura transaction layer.
//!
//! Builds, signs and validates shielded transactions on top of
//! `obscura-privacy`.
//!
//! ```text
//!   PaymentRequest ──► TxBuilder ──► UnsignedTransaction ──sign──► Transaction
//!                          │                                          │
//!                    sampler (rings)                       validation pipeline
//!                          │                                          │
//!                          └──────────── &dyn ChainState ◄────────────┘
//! ```
//!
//! Plain transfers are [`Transaction`]s; token transfers wrap two of them in a
//! [`TokenTransaction`]. Both implement [`Validatable`], so blocks of either
//! go through [`validate`], [`batch_validate`] and [`check_block_uniqueness`].

pub mod batch;
pub mod builder;
pub mod env;
pub mod errors;
pub mod guard;
pub mod metadata;
pub mod sampler;
pub mod state;
pub mod token;
pub mod traits;
pub mod transaction;
pub mod validation;

pub use batch::{BatchFailure, DeferredRange, RangePartition, batch_validate, validate_batch};
pub use builder::{MintRequest, PaymentRequest, TxBuilder, UnsignedTransaction};
pub use env::{TxParams, ValidationEnvironment};
pub use errors::{ErrorKind, Result, TransactionError};
pub use guard::{check_block_uniqueness, check_double_spend, check_replay};
pub use metadata::{MetadataGrants, MintAuthority, NoMinting};
pub use state::{ChainState, LedgerDiff, MemoryChainState, TokenInfo};
pub use token::{
    MintableIssue, SpendCoins, TokenCrossShardParams, TokenData, TokenInitParams, TokenKind,
    TokenTransaction, TokenTransferParams, derive_token_id,
};
pub use traits::{ProofBearing, Signable, TokenCarrying};
pub use transaction::{MetadataRef, Transaction, TxHash, TxType, combined_hash};
pub use validation::{
    Accepted, ChainValidated, ItselfValidated, Rejection, SanityChecked, Stage, Unvalidated,
    Validatable, ValidationContext, validate,
};
