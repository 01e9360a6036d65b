//! Version-2 payment proof
//!
//! One MLSAG over all inputs jointly plus an aggregated range proof.
//!
//! ```text
//! row i = [ OTA_i0 .. OTA_i(n-1) | balance columns ]
//!
//! plain (k = 1):
//!   B_i = Σ_j C_ij − Σ C_out − fee·Gv                    key Σ r_in − Σ r_out
//! confidential asset (k = 2, fee 0):
//!   A_i = n_out·Σ_j AT_ij − n_in·Σ AT_out                  key n_out·Σ bl_in − n_in·Σ bl_out
//!   B_i = Σ_j C_ij − Σ C_out                               key Σ (v·bl + r)_in − Σ (v·bl + r)_out
//! ```
//!
//! Confidential-asset range proofs use the first output's asset tag as the
//! value base: `C_k = v_k·AT_0 + (v_k·(bl_k − bl_0) + r_k)·Gr`.

use ark_ff::Zero;

use crate::bulletproofs::{AggregatedRangeProof, RangeStatement};
use crate::coin::CoinV2;
use crate::errors::{PrivacyError, Result};
use crate::generators::{MAX_AGGREGATED_OUTPUTS, PEDERSEN};
use crate::mlsag::{Mlsag, MlsagSignature, Ring};
use crate::operation::{POINT_SIZE, Point, Scalar, point_from_bytes, point_to_bytes, sum_points};

/// What the ledger keeps about a v2 output so it can serve as a ring member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingMember {
    pub public_key: Point,
    pub commitment: Point,
    pub asset_tag: Option<Point>,
}

impl RingMember {
    pub fn from_coin(coin: &CoinV2) -> Self {
        Self {
            public_key: coin.public_key,
            commitment: coin.commitment,
            asset_tag: coin.asset_tag,
        }
    }

    /// `OTA ‖ C (‖ AT)`: 64 or 96 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * POINT_SIZE);
        out.extend_from_slice(&point_to_bytes(&self.public_key));
        out.extend_from_slice(&point_to_bytes(&self.commitment));
        if let Some(tag) = &self.asset_tag {
            out.extend_from_slice(&point_to_bytes(tag));
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let asset_tag = match bytes.len() {
            64 => None,
            96 => Some(point_from_bytes(&bytes[64..])?),
            got => {
                return Err(PrivacyError::InvalidLength {
                    what: "ring member",
                    expected: 96,
                    got,
                });
            }
        };
        Ok(Self {
            public_key: point_from_bytes(&bytes[..32])?,
            commitment: point_from_bytes(&bytes[32..64])?,
            asset_tag,
        })
    }
}

/// Sampled ring: `rows × inputs` members with the real inputs in row `pi`.
#[derive(Debug, Clone)]
pub struct RingV2 {
    pub members: Vec<Vec<RingMember>>,
    pub indices: Vec<Vec<u64>>,
    pub pi: usize,
}

/// Prover-side view of one spent coin.
#[derive(Debug, Clone)]
pub struct InputV2 {
    /// Revealed coin (value and randomness known)
    pub coin: CoinV2,
    /// `x` with `OTA = x·G`
    pub private_key: Scalar,
    /// Asset-tag blinder; zero for native coins and public mints
    pub asset_blinder: Scalar,
}

/// A plaintext output with the secret its payload is sealed under.
#[derive(Debug, Clone)]
pub struct OutputV2 {
    pub coin: CoinV2,
    pub shared_secret: Point,
    pub asset_blinder: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProofV2 {
    /// One per input, in input order
    pub key_images: Vec<Point>,
    /// `rows × inputs` persisted indices of the ring members
    pub ring_indices: Vec<Vec<u64>>,
    pub output_coins: Vec<CoinV2>,
    pub range_proof: Option<AggregatedRangeProof>,
    pub confidential_asset: bool,
}

fn opening(coin: &CoinV2) -> Result<(u64, Scalar)> {
    Ok((
        coin.value.ok_or(PrivacyError::MissingField("value"))?,
        coin.randomness.ok_or(PrivacyError::MissingField("randomness"))?,
    ))
}

impl ProofV2 {
    /// Build the proof and the MLSAG signer for the transaction hash.
    pub fn prove(
        inputs: &[InputV2],
        ring: &RingV2,
        outputs: &[OutputV2],
        fee: u64,
        confidential_asset: bool,
    ) -> Result<(Self, Mlsag)> {
        if inputs.is_empty() {
            return Err(PrivacyError::MalformedProof("v2 proof needs an input".into()));
        }
        if outputs.is_empty() || outputs.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: outputs.len(),
            });
        }
        if confidential_asset && fee != 0 {
            return Err(PrivacyError::MalformedProof(
                "confidential-asset proofs carry no fee".into(),
            ));
        }
        let real_row = ring
            .members
            .get(ring.pi)
            .ok_or_else(|| PrivacyError::MalformedRing(format!("pi {} out of ring", ring.pi)))?;
        if real_row.len() != inputs.len() {
            return Err(PrivacyError::MalformedRing("ring width differs from inputs".into()));
        }
        for (member, input) in real_row.iter().zip(inputs) {
            if member.public_key != input.coin.public_key || member.commitment != input.coin.commitment {
                return Err(PrivacyError::MalformedRing(
                    "real coin is not in row pi".into(),
                ));
            }
        }

        let mut input_sum: u64 = 0;
        let mut output_sum: u64 = 0;
        let mut keys: Vec<Scalar> = inputs.iter().map(|i| i.private_key).collect();
        let mut r_in = Scalar::zero();
        let mut bl_in = Scalar::zero();
        for input in inputs {
            let (v, r) = opening(&input.coin)?;
            input_sum = input_sum.checked_add(v).ok_or(PrivacyError::ValueOverflow)?;
            r_in += if confidential_asset {
                Scalar::from(v) * input.asset_blinder + r
            } else {
                r
            };
            bl_in += input.asset_blinder;
        }

        let mut values = Vec::with_capacity(outputs.len());
        let mut gammas = Vec::with_capacity(outputs.len());
        let mut r_out = Scalar::zero();
        let mut bl_out = Scalar::zero();
        let bl_0 = outputs[0].asset_blinder;
        for output in outputs {
            let (v, r) = opening(&output.coin)?;
            output_sum = output_sum.checked_add(v).ok_or(PrivacyError::ValueOverflow)?;
            let v_scalar = Scalar::from(v);
            if confidential_asset {
                r_out += v_scalar * output.asset_blinder + r;
                gammas.push(v_scalar * (output.asset_blinder - bl_0) + r);
            } else {
                r_out += r;
                gammas.push(r);
            }
            bl_out += output.asset_blinder;
            values.push(v);
        }
        let spent = output_sum.checked_add(fee).ok_or(PrivacyError::ValueOverflow)?;
        if spent != input_sum {
            return Err(PrivacyError::VerificationFailed("value conservation"));
        }

        if confidential_asset {
            let n_in = Scalar::from(inputs.len() as u64);
            let n_out = Scalar::from(outputs.len() as u64);
            keys.push(n_out * bl_in - n_in * bl_out);
        }
        keys.push(r_in - r_out);

        let mut output_coins = Vec::with_capacity(outputs.len());
        for output in outputs {
            let mut sealed = output.coin.clone();
            if !sealed.is_burning() {
                sealed.conceal(&output.shared_secret)?;
            }
            output_coins.push(sealed);
        }

        let proof = Self {
            key_images: Vec::new(),
            ring_indices: ring.indices.clone(),
            output_coins,
            range_proof: None,
            confidential_asset,
        };
        let value_base = proof.value_base()?;
        let range_proof = AggregatedRangeProof::prove(&values, &gammas, &value_base)?;
        let mut proof = Self {
            range_proof: Some(range_proof),
            ..proof
        };

        let mlsag_ring = proof.build_ring(&ring.members, fee)?;
        let signer = Mlsag::new(mlsag_ring, ring.pi, keys, inputs.len())?;
        proof.key_images = signer.key_images();
        Ok((proof, signer))
    }

    /// Proof for a no-input mint: plaintext outputs, no ring.
    pub fn mint(output_coins: Vec<CoinV2>) -> Self {
        Self {
            key_images: Vec::new(),
            ring_indices: Vec::new(),
            output_coins,
            range_proof: None,
            confidential_asset: false,
        }
    }

    pub fn is_mint(&self) -> bool {
        self.key_images.is_empty()
    }

    fn value_base(&self) -> Result<Point> {
        if self.confidential_asset {
            self.output_coins
                .first()
                .and_then(|c| c.asset_tag)
                .ok_or(PrivacyError::MissingField("asset tag"))
        } else {
            Ok(PEDERSEN.g_value())
        }
    }

    pub fn check_shape(&self) -> Result<()> {
        let n_in = self.key_images.len();
        if self.output_coins.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: self.output_coins.len(),
            });
        }
        if self.is_mint() {
            if !self.ring_indices.is_empty() || self.range_proof.is_some() {
                return Err(PrivacyError::MalformedProof("mint proof carries a ring".into()));
            }
            if self.output_coins.iter().any(CoinV2::is_concealed) {
                return Err(PrivacyError::MalformedProof("mint outputs must be public".into()));
            }
            return Ok(());
        }
        if self.ring_indices.is_empty() || self.ring_indices.iter().any(|row| row.len() != n_in) {
            return Err(PrivacyError::MalformedRing(format!(
                "ring rows must each hold {} indices",
                n_in
            )));
        }
        if self.output_coins.is_empty() || self.range_proof.is_none() {
            return Err(PrivacyError::MalformedProof("missing outputs or range proof".into()));
        }
        let tagged = self.output_coins.iter().filter(|c| c.asset_tag.is_some()).count();
        let expected = if self.confidential_asset { self.output_coins.len() } else { 0 };
        if tagged != expected {
            return Err(PrivacyError::MalformedProof(
                "asset tags do not match the proof kind".into(),
            ));
        }
        Ok(())
    }

    /// Number of balance columns appended to every ring row.
    pub fn balance_columns(&self) -> usize {
        if self.confidential_asset { 2 } else { 1 }
    }

    /// Rebuild the MLSAG ring from resolved members.
    pub fn build_ring(&self, members: &[Vec<RingMember>], fee: u64) -> Result<Ring> {
        // while proving, key images are not known yet
        let n_in = if self.key_images.is_empty() {
            members.first().map(Vec::len).unwrap_or(0)
        } else {
            self.key_images.len()
        };
        if members.len() != self.ring_indices.len() {
            return Err(PrivacyError::MalformedRing(format!(
                "{} resolved rows for {} indexed rows",
                members.len(),
                self.ring_indices.len()
            )));
        }
        let out_commitments = sum_points(self.output_coins.iter().map(|c| &c.commitment));
        let n_out = Scalar::from(self.output_coins.len() as u64);
        let n_in_scalar = Scalar::from(n_in as u64);
        let out_tags = if self.confidential_asset {
            let mut acc = Point::zero();
            for coin in &self.output_coins {
                acc += coin.asset_tag.ok_or(PrivacyError::MissingField("asset tag"))?;
            }
            acc
        } else {
            Point::zero()
        };

        let mut keys = Vec::with_capacity(members.len());
        for row in members {
            if row.len() != n_in {
                return Err(PrivacyError::MalformedRing("ragged ring rows".into()));
            }
            let mut cols: Vec<Point> = row.iter().map(|m| m.public_key).collect();
            if self.confidential_asset {
                let mut in_tags = Point::zero();
                for member in row {
                    in_tags += member
                        .asset_tag
                        .ok_or_else(|| PrivacyError::MalformedRing("ring member has no asset tag".into()))?;
                }
                cols.push(in_tags * n_out - out_tags * n_in_scalar);
            }
            let in_commitments = sum_points(row.iter().map(|m| &m.commitment));
            cols.push(in_commitments - out_commitments - PEDERSEN.g_value() * Scalar::from(fee));
            keys.push(cols);
        }
        Ring::new(keys)
    }

    pub fn range_statement(&self) -> Result<Option<RangeStatement<'_>>> {
        let Some(proof) = self.range_proof.as_ref() else {
            return Ok(None);
        };
        Ok(Some(RangeStatement {
            proof,
            commitments: self.output_coins.iter().map(|c| c.commitment).collect(),
            value_base: self.value_base()?,
        }))
    }

    /// Verify the ring signature over `message` against the resolved ring.
    pub fn verify_signature(
        &self,
        members: &[Vec<RingMember>],
        fee: u64,
        signature: &MlsagSignature,
        message: &[u8; 32],
    ) -> Result<()> {
        self.check_shape()?;
        if self.confidential_asset && fee != 0 {
            return Err(PrivacyError::MalformedProof(
                "confidential-asset proofs carry no fee".into(),
            ));
        }
        let ring = self.build_ring(members, fee)?;
        signature.verify(&ring, &self.key_images, self.key_images.len(), message)
    }

    /// Signature, output commitments and range proof.
    pub fn verify(
        &self,
        members: &[Vec<RingMember>],
        fee: u64,
        signature: &MlsagSignature,
        message: &[u8; 32],
    ) -> Result<()> {
        self.verify_signature(members, fee, signature, message)?;
        for coin in &self.output_coins {
            coin.verify_commitment()?;
        }
        if let Some(statement) = self.range_statement()? {
            statement
                .proof
                .verify(&statement.commitments, &statement.value_base)?;
        }
        Ok(())
    }
}
