//! Error definitions for the privacy primitives.
//!
//! Every parsing and verification path in this crate reports through
//! [`PrivacyError`]; nothing here panics on attacker-controlled bytes.
use thiserror::Error;

/// Errors raised while building, parsing or verifying privacy objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    /// Bytes do not decode to a prime-order curve point
    #[error("Invalid point encoding")]
    InvalidPoint,

    /// Bytes do not decode to a canonical scalar
    #[error("Invalid scalar encoding")]
    InvalidScalar,

    /// Input had the wrong length
    #[error("Invalid length for {what}: expected {expected}, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Binary codec failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// Binary codec failure while writing
    #[error("Encode error: {0}")]
    Encode(String),

    /// Unknown proof version tag
    #[error("Unknown proof version: {0}")]
    UnknownProofVersion(u8),

    /// Coin commitment does not match its opening
    #[error("Commitment mismatch")]
    CommitmentMismatch,

    /// Encrypted payload could not be opened
    #[error("Decryption failed")]
    DecryptError,

    /// Coin is missing a field needed by this operation
    #[error("Coin is missing {0}")]
    MissingField(&'static str),

    /// Ring has an unexpected shape
    #[error("Malformed ring: {0}")]
    MalformedRing(String),

    /// Proof has an unexpected shape
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// Too many or too few values for the range proof
    #[error("Range proof supports 1 to {max} values, got {got}")]
    RangeProofSize { max: usize, got: usize },

    /// A sigma-protocol or signature check failed
    #[error("{0} verification failed")]
    VerificationFailed(&'static str),

    /// A scalar that must be invertible was zero
    #[error("Zero scalar has no inverse")]
    NonInvertible,

    /// Arithmetic overflow on coin values
    #[error("Value overflow")]
    ValueOverflow,
}

/// Result type for privacy operations
pub type Result<T> = std::result::Result<T, PrivacyError>;
