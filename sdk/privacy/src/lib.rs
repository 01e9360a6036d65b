//! Obscura Privacy SDK
//!
//! Ring-signature and range-proof primitives for shielded transfers on the
//! Jubjub curve.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Payment Proof                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │ Spent coins  │  │  New coins   │  │   Encrypted openings  │  │
//! │  │ (SN / KI)    │  │ (commitments)│  │   (for recipients)    │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘  │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │ v1: one-out-of-many + serial-number proofs + Schnorr    │    │
//! │  │ v2: MLSAG (+ confidential-asset columns)                │    │
//! │  │ both: aggregated Bulletproof, values in [0, 2^64)       │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod bulletproofs;
pub mod coin;
pub mod errors;
pub mod generators;
pub mod keys;
pub mod mlsag;
pub mod multiexp;
pub mod one_out_of_many;
pub mod operation;
pub mod proof;
pub mod schnorr;
pub mod serde_utils;
pub mod serial_number;

pub use bulletproofs::{AggregatedRangeProof, RangeStatement, batch_verify, find_invalid};
pub use coin::{BURNING_ADDRESS, Coin, CoinV1, CoinV2, TokenId, is_burning_key};
pub use errors::{PrivacyError, Result};
pub use generators::{BULLETPROOF, PEDERSEN};
pub use keys::{KeySet, PaymentAddress, PaymentInfo, ReceivingKey, SpendingKey};
pub use mlsag::{Mlsag, MlsagSignature, Ring};
pub use operation::{Point, Scalar, hash_to_scalar, point_from_bytes, point_to_bytes};
pub use proof::{ConversionProof, Proof, ProofV1, ProofV2, RingMember};
pub use schnorr::{SchnorrPrivateKey, SchnorrPublicKey, SchnorrSignature};
