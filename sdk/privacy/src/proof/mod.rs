//! Payment proofs
//!
//! ```text
//! wire:  version tag (1 byte) ‖ wincode body
//!        1 = v1 (one-out-of-many + serial numbers + range proof)
//!        2 = v2 (MLSAG + range proof)
//!        3 = conversion (plain v1 in, v2 out)
//! ```

pub mod codec;
pub mod conversion;
pub mod v1;
pub mod v2;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bulletproofs::RangeStatement;
use crate::coin::Coin;
use crate::errors::{PrivacyError, Result};
use crate::operation::Point;

pub use conversion::ConversionProof;
pub use v1::{InputV1, OutputV1, ProofV1};
pub use v2::{InputV2, OutputV2, ProofV2, RingMember, RingV2};

use codec::{ConversionWire, ProofV1Wire, ProofV2Wire, decode_error, encode_error};

pub const PROOF_VERSION_V1: u8 = 1;
pub const PROOF_VERSION_V2: u8 = 2;
pub const PROOF_VERSION_CONVERSION: u8 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Proof {
    V1(ProofV1),
    V2(ProofV2),
    Conversion(ConversionProof),
}

impl Proof {
    pub fn version(&self) -> u8 {
        match self {
            Proof::V1(_) => PROOF_VERSION_V1,
            Proof::V2(_) => PROOF_VERSION_V2,
            Proof::Conversion(_) => PROOF_VERSION_CONVERSION,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = match self {
            Proof::V1(p) => wincode::serialize(&ProofV1Wire::from(p)),
            Proof::V2(p) => wincode::serialize(&ProofV2Wire::from(p)),
            Proof::Conversion(p) => wincode::serialize(&ConversionWire::from(p)),
        }
        .map_err(encode_error)?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(self.version());
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (tag, body) = bytes
            .split_first()
            .ok_or_else(|| PrivacyError::Decode("empty proof".into()))?;
        match *tag {
            PROOF_VERSION_V1 => {
                let wire: ProofV1Wire = wincode::deserialize(body).map_err(decode_error)?;
                Ok(Proof::V1(ProofV1::try_from(wire)?))
            }
            PROOF_VERSION_V2 => {
                let wire: ProofV2Wire = wincode::deserialize(body).map_err(decode_error)?;
                Ok(Proof::V2(ProofV2::try_from(wire)?))
            }
            PROOF_VERSION_CONVERSION => {
                let wire: ConversionWire = wincode::deserialize(body).map_err(decode_error)?;
                Ok(Proof::Conversion(ConversionProof::try_from(wire)?))
            }
            other => Err(PrivacyError::UnknownProofVersion(other)),
        }
    }

    /// Spend identifiers revealed by this proof: serial numbers or key images.
    pub fn spent_identifiers(&self) -> Vec<Point> {
        match self {
            Proof::V1(p) => p.serial_numbers.clone(),
            Proof::V2(p) => p.key_images.clone(),
            Proof::Conversion(p) => p
                .input_coins
                .iter()
                .filter_map(|c| c.serial_number)
                .collect(),
        }
    }

    pub fn input_count(&self) -> usize {
        match self {
            Proof::V1(p) => p.serial_numbers.len(),
            Proof::V2(p) => p.key_images.len(),
            Proof::Conversion(p) => p.input_coins.len(),
        }
    }

    pub fn output_coins(&self) -> Vec<Coin> {
        match self {
            Proof::V1(p) => p.output_coins.iter().cloned().map(Coin::V1).collect(),
            Proof::V2(p) => p.output_coins.iter().cloned().map(Coin::V2).collect(),
            Proof::Conversion(p) => p.output_coins.iter().cloned().map(Coin::V2).collect(),
        }
    }

    pub fn output_count(&self) -> usize {
        match self {
            Proof::V1(p) => p.output_coins.len(),
            Proof::V2(p) => p.output_coins.len(),
            Proof::Conversion(p) => p.output_coins.len(),
        }
    }

    pub fn check_shape(&self) -> Result<()> {
        match self {
            Proof::V1(p) => p.check_shape(),
            Proof::V2(p) => p.check_shape(),
            Proof::Conversion(p) => p.check_shape(),
        }
    }

    pub fn range_statement(&self) -> Result<Option<RangeStatement<'_>>> {
        match self {
            Proof::V1(p) => Ok(p.range_statement()),
            Proof::V2(p) => p.range_statement(),
            Proof::Conversion(p) => Ok(Some(p.range_statement())),
        }
    }
}

impl Serialize for Proof {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let bytes = self.to_bytes().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex::encode(bytes))
    }
}

impl<'de> Deserialize<'de> for Proof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Proof::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}
