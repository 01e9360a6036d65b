//! Transaction-layer errors.
//!
//! Every rejection carries an [`ErrorKind`] so callers can tell a malformed
//! transaction from a cryptographic failure or a conflict with chain state.
use obscura_privacy::{PrivacyError, TokenId};
use thiserror::Error;

/// Broad class of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural problem found without touching state or cryptography
    Sanity,
    /// Signature, ring or proof failure
    Crypto,
    /// Conflict with, or missing data in, persisted state
    ChainState,
    /// A bounded search ran out of attempts
    Resource,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid transaction version {0}")]
    InvalidVersion(u8),

    #[error("Transaction version {version} cannot carry a proof of version {proof}")]
    VersionMismatch { version: u8, proof: u8 },

    #[error("Lock time {lock_time} is later than {limit}")]
    FutureLockTime { lock_time: u64, limit: u64 },

    #[error("{field} is {got} bytes, limit is {max}")]
    OversizedField {
        field: &'static str,
        max: usize,
        got: usize,
    },

    #[error("Count mismatch: {0}")]
    CountMismatch(String),

    #[error("Coin commitment does not match its opening")]
    CommitmentMismatch,

    #[error("Invalid transaction type: {0}")]
    InvalidType(String),

    #[error("Duplicate {0} inside one transaction")]
    DuplicateInTransaction(&'static str),

    #[error("Malformed transaction: {0}")]
    Malformed(String),

    #[error("Payload could not be decrypted")]
    Decrypt,

    #[error("Malformed ring: {0}")]
    MalformedRing(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Proof rejected: {0}")]
    Proof(PrivacyError),

    #[error("Value conservation violated: {0}")]
    Conservation(String),

    #[error("Spend identifier {0} already recorded")]
    DoubleSpend(String),

    #[error("Output {0} already recorded")]
    ReplayedOutput(String),

    #[error("Unknown token {0}")]
    UnknownToken(TokenId),

    #[error("Token id {0} already exists")]
    TokenIdExists(TokenId),

    #[error("Ring member {index} of token {token_id} is not persisted")]
    MissingRingMember { token_id: TokenId, index: u64 },

    #[error("Coin being spent is not in persisted state")]
    RandomCommitment,

    #[error("Need {need} persisted coins to sample rings, have {have}")]
    InsufficientRingMembers { need: u64, have: u64 },

    #[error("Input coin {0} is not in persisted state")]
    UnknownInput(String),

    #[error("Mint not authorized: {0}")]
    MintNotAuthorized(String),

    #[error("State lookup failed: {0}")]
    State(String),

    #[error("No usable one-time address after {attempts} attempts")]
    OtaExhausted { attempts: usize },
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        use TransactionError::*;
        match self {
            InvalidVersion(_)
            | VersionMismatch { .. }
            | FutureLockTime { .. }
            | OversizedField { .. }
            | CountMismatch(_)
            | CommitmentMismatch
            | InvalidType(_)
            | DuplicateInTransaction(_)
            | Malformed(_) => ErrorKind::Sanity,
            Decrypt
            | MalformedRing(_)
            | InvalidSignature(_)
            | Proof(_)
            | Conservation(_) => ErrorKind::Crypto,
            DoubleSpend(_)
            | ReplayedOutput(_)
            | UnknownToken(_)
            | TokenIdExists(_)
            | MissingRingMember { .. }
            | RandomCommitment
            | InsufficientRingMembers { .. }
            | UnknownInput(_)
            | MintNotAuthorized(_)
            | State(_) => ErrorKind::ChainState,
            OtaExhausted { .. } => ErrorKind::Resource,
        }
    }

    /// Wrap a storage failure from a [`ChainState`](crate::state::ChainState) lookup.
    pub fn state(err: anyhow::Error) -> Self {
        TransactionError::State(format!("{err:#}"))
    }
}

impl From<PrivacyError> for TransactionError {
    fn from(err: PrivacyError) -> Self {
        match err {
            PrivacyError::CommitmentMismatch => TransactionError::CommitmentMismatch,
            PrivacyError::DecryptError => TransactionError::Decrypt,
            PrivacyError::MalformedRing(msg) => TransactionError::MalformedRing(msg),
            PrivacyError::InvalidPoint
            | PrivacyError::InvalidScalar
            | PrivacyError::InvalidLength { .. }
            | PrivacyError::Decode(_)
            | PrivacyError::Encode(_)
            | PrivacyError::UnknownProofVersion(_) => TransactionError::Malformed(err.to_string()),
            PrivacyError::MalformedProof(msg) => TransactionError::CountMismatch(msg),
            PrivacyError::RangeProofSize { max, got } => {
                TransactionError::CountMismatch(format!("range proof covers 1 to {max} outputs, got {got}"))
            }
            other => TransactionError::Proof(other),
        }
    }
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;
