//! Version-1 payment proof
//!
//! ```text
//! comSK    = sk·G   + rSK·Gr          (one per proof)
//! comShard = sh·Gsh + rSh·Gr          (one per proof)
//! comV_i   = v_i·Gv + rV_i·Gr         comSND_i = snd_i·Gsnd + rSND_i·Gr
//!
//! input i:  ring D_j = C_j − (comSK + comV_i + comSND_i + comShard)
//!           exactly one D_j is r'·Gr   ─► one-out-of-many
//!           SN_i from comSK, comSND_i  ─► serial-number proof
//! output k: C_k = PK_k + comOutV_k + snd_k·Gsnd + sh_k·Gsh
//!           comOutV_k ∈ [0, 2^64)      ─► aggregated range proof
//! balance:  P = comSK + Σ comV_i − Σ comOutV_k − fee·Gv = sk·G + ρ·Gr
//!           tx signed by Schnorr(P)
//! ```

use ark_ff::Zero;

use crate::bulletproofs::{AggregatedRangeProof, RangeStatement};
use crate::coin::CoinV1;
use crate::errors::{PrivacyError, Result};
use crate::generators::{MAX_AGGREGATED_OUTPUTS, PEDERSEN};
use crate::keys::SpendingKey;
use crate::one_out_of_many::{OneOutOfManyProof, RING_SIZE};
use crate::operation::{Point, Scalar, random_scalar, sum_points};
use crate::schnorr::SchnorrPrivateKey;
use crate::serial_number::{SerialNumberProof, SerialNumberStatement, SerialNumberWitness};

/// Prover-side view of one spent coin and its ring.
#[derive(Debug, Clone)]
pub struct InputV1 {
    /// Revealed coin (value and randomness known)
    pub coin: CoinV1,
    /// Commitments of the ring members, in ring order
    pub ring: Vec<Point>,
    /// Persisted index of every ring member
    pub ring_indices: Vec<u64>,
    /// Slot of the real coin in `ring`
    pub position: usize,
}

/// A plaintext output and the key its opening is sealed to.
#[derive(Debug, Clone)]
pub struct OutputV1 {
    pub coin: CoinV1,
    pub transmission_key: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProofV1 {
    pub com_input_sk: Point,
    pub com_input_shard: Point,
    pub com_input_value: Vec<Point>,
    pub com_input_snd: Vec<Point>,
    pub serial_numbers: Vec<Point>,
    pub commitment_indices: Vec<Vec<u64>>,
    pub one_of_many: Vec<OneOutOfManyProof>,
    pub serial_number_proofs: Vec<SerialNumberProof>,
    pub com_output_value: Vec<Point>,
    pub output_coins: Vec<CoinV1>,
    pub range_proof: Option<AggregatedRangeProof>,
}

impl ProofV1 {
    /// Build the proof and the key that must sign the transaction hash.
    pub fn prove(
        spending_key: &SpendingKey,
        inputs: &[InputV1],
        outputs: &[OutputV1],
        fee: u64,
    ) -> Result<(Self, SchnorrPrivateKey)> {
        if inputs.is_empty() {
            return Err(PrivacyError::MalformedProof("v1 proof needs an input".into()));
        }
        if outputs.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: outputs.len(),
            });
        }

        let sk = *spending_key.scalar();
        let shard = Scalar::from(inputs[0].coin.shard() as u64);
        let r_sk = random_scalar();
        let r_shard = random_scalar();
        let com_input_sk = PEDERSEN.g_pk() * sk + PEDERSEN.g_rand() * r_sk;
        let com_input_shard = PEDERSEN.g_shard() * shard + PEDERSEN.g_rand() * r_shard;

        let mut com_input_value = Vec::with_capacity(inputs.len());
        let mut com_input_snd = Vec::with_capacity(inputs.len());
        let mut serial_numbers = Vec::with_capacity(inputs.len());
        let mut commitment_indices = Vec::with_capacity(inputs.len());
        let mut one_of_many = Vec::with_capacity(inputs.len());
        let mut serial_number_proofs = Vec::with_capacity(inputs.len());
        let mut r_value_sum = Scalar::zero();
        let mut input_sum: u64 = 0;

        for input in inputs {
            let coin = &input.coin;
            let value = coin.value.ok_or(PrivacyError::MissingField("value"))?;
            let randomness = coin.randomness.ok_or(PrivacyError::MissingField("randomness"))?;
            if input.ring.len() != RING_SIZE || input.ring_indices.len() != RING_SIZE {
                return Err(PrivacyError::MalformedRing(format!(
                    "expected {} ring members, got {}",
                    RING_SIZE,
                    input.ring.len()
                )));
            }
            if input.ring.get(input.position) != Some(&coin.commitment) {
                return Err(PrivacyError::MalformedRing(
                    "real commitment is not at its ring position".into(),
                ));
            }
            input_sum = input_sum
                .checked_add(value)
                .ok_or(PrivacyError::ValueOverflow)?;

            let r_value = random_scalar();
            let r_snd = random_scalar();
            let com_value = PEDERSEN.g_value() * Scalar::from(value) + PEDERSEN.g_rand() * r_value;
            let com_snd = PEDERSEN.g_snd() * coin.snd + PEDERSEN.g_rand() * r_snd;
            let serial_number = coin.derive_serial_number(spending_key)?;

            let cm_sum = com_input_sk + com_value + com_snd + com_input_shard;
            let shifted: Vec<Point> = input.ring.iter().map(|c| *c - cm_sum).collect();
            let zero_randomness = randomness - r_sk - r_value - r_snd - r_shard;
            one_of_many.push(OneOutOfManyProof::prove(
                &shifted,
                input.position,
                &zero_randomness,
            )?);

            let statement = SerialNumberStatement {
                com_sk: com_input_sk,
                com_snd,
                serial_number,
            };
            serial_number_proofs.push(SerialNumberProof::prove(
                &statement,
                &SerialNumberWitness {
                    sk,
                    r_sk,
                    snd: coin.snd,
                    r_snd,
                },
            ));

            r_value_sum += r_value;
            com_input_value.push(com_value);
            com_input_snd.push(com_snd);
            serial_numbers.push(serial_number);
            commitment_indices.push(input.ring_indices.clone());
        }

        let mut output_sum: u64 = 0;
        let mut values = Vec::with_capacity(outputs.len());
        let mut randomness = Vec::with_capacity(outputs.len());
        let mut com_output_value = Vec::with_capacity(outputs.len());
        let mut output_coins = Vec::with_capacity(outputs.len());
        for output in outputs {
            let value = output.coin.value.ok_or(PrivacyError::MissingField("value"))?;
            let r = output
                .coin
                .randomness
                .ok_or(PrivacyError::MissingField("randomness"))?;
            output_sum = output_sum
                .checked_add(value)
                .ok_or(PrivacyError::ValueOverflow)?;
            com_output_value.push(output.coin.value_commitment()?);
            values.push(value);
            randomness.push(r);

            let mut sealed = output.coin.clone();
            sealed.conceal(&output.transmission_key)?;
            output_coins.push(sealed);
        }

        let spent = output_sum.checked_add(fee).ok_or(PrivacyError::ValueOverflow)?;
        if spent != input_sum {
            return Err(PrivacyError::VerificationFailed("value conservation"));
        }

        let range_proof = if values.is_empty() {
            None
        } else {
            Some(AggregatedRangeProof::prove(
                &values,
                &randomness,
                &PEDERSEN.g_value(),
            )?)
        };

        let r_out_sum: Scalar = randomness.iter().sum();
        let signing_key = SchnorrPrivateKey::new(sk, Some(r_sk + r_value_sum - r_out_sum));

        let proof = Self {
            com_input_sk,
            com_input_shard,
            com_input_value,
            com_input_snd,
            serial_numbers,
            commitment_indices,
            one_of_many,
            serial_number_proofs,
            com_output_value,
            output_coins,
            range_proof,
        };
        Ok((proof, signing_key))
    }

    /// Proof for a no-input mint: plaintext outputs, no rings, no range proof.
    pub fn mint(output_coins: Vec<CoinV1>) -> Result<Self> {
        if output_coins.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: output_coins.len(),
            });
        }
        let com_output_value = output_coins
            .iter()
            .map(CoinV1::value_commitment)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            com_input_sk: Point::zero(),
            com_input_shard: Point::zero(),
            com_input_value: Vec::new(),
            com_input_snd: Vec::new(),
            serial_numbers: Vec::new(),
            commitment_indices: Vec::new(),
            one_of_many: Vec::new(),
            serial_number_proofs: Vec::new(),
            com_output_value,
            output_coins,
            range_proof: None,
        })
    }

    pub fn is_mint(&self) -> bool {
        self.serial_numbers.is_empty()
    }

    /// Structural checks only: every per-input and per-output vector lines up.
    pub fn check_shape(&self) -> Result<()> {
        let n_in = self.serial_numbers.len();
        if self.com_output_value.len() != self.output_coins.len() {
            return Err(PrivacyError::MalformedProof(
                "output value commitments differ from outputs".into(),
            ));
        }
        if self.output_coins.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: self.output_coins.len(),
            });
        }
        if n_in == 0 {
            let has_inputs = !self.com_input_value.is_empty()
                || !self.one_of_many.is_empty()
                || !self.commitment_indices.is_empty();
            if has_inputs || self.range_proof.is_some() {
                return Err(PrivacyError::MalformedProof("mint proof carries a ring".into()));
            }
            if self.output_coins.iter().any(CoinV1::is_concealed) {
                return Err(PrivacyError::MalformedProof("mint outputs must be public".into()));
            }
            return Ok(());
        }
        let per_input = [
            self.com_input_value.len(),
            self.com_input_snd.len(),
            self.commitment_indices.len(),
            self.one_of_many.len(),
            self.serial_number_proofs.len(),
        ];
        if per_input.iter().any(|len| *len != n_in) {
            return Err(PrivacyError::MalformedProof(
                "per-input vectors differ in length".into(),
            ));
        }
        if self.commitment_indices.iter().any(|ring| ring.len() != RING_SIZE) {
            return Err(PrivacyError::MalformedRing(format!(
                "every input needs {} ring indices",
                RING_SIZE
            )));
        }
        if self.output_coins.is_empty() != self.range_proof.is_none() {
            return Err(PrivacyError::MalformedProof(
                "range proof presence does not match outputs".into(),
            ));
        }
        Ok(())
    }

    /// Public key the transaction signature must verify under.
    pub fn balance_key(&self, fee: u64) -> Point {
        self.com_input_sk + sum_points(&self.com_input_value)
            - sum_points(&self.com_output_value)
            - PEDERSEN.g_value() * Scalar::from(fee)
    }

    /// Check that every output commitment is built on its value commitment.
    pub fn verify_outputs(&self) -> Result<()> {
        for (coin, com_value) in self.output_coins.iter().zip(&self.com_output_value) {
            coin.verify_with_value_commitment(com_value)?;
        }
        Ok(())
    }

    /// Ring and serial-number proofs for every input.
    ///
    /// `rings[i]` holds the commitments at `commitment_indices[i]`. With
    /// `allow_ring_failure` a failed one-out-of-many proof is tolerated.
    pub fn verify_inputs(&self, rings: &[Vec<Point>], allow_ring_failure: bool) -> Result<()> {
        self.check_shape()?;
        if rings.len() != self.serial_numbers.len() {
            return Err(PrivacyError::MalformedRing(format!(
                "{} rings for {} inputs",
                rings.len(),
                self.serial_numbers.len()
            )));
        }
        for (i, ring) in rings.iter().enumerate() {
            let cm_sum = self.com_input_sk
                + self.com_input_value[i]
                + self.com_input_snd[i]
                + self.com_input_shard;
            let shifted: Vec<Point> = ring.iter().map(|c| *c - cm_sum).collect();
            match self.one_of_many[i].verify(&shifted) {
                Ok(()) => {}
                Err(PrivacyError::VerificationFailed(_)) if allow_ring_failure => {}
                Err(e) => return Err(e),
            }

            let statement = SerialNumberStatement {
                com_sk: self.com_input_sk,
                com_snd: self.com_input_snd[i],
                serial_number: self.serial_numbers[i],
            };
            self.serial_number_proofs[i].verify(&statement)?;
        }
        Ok(())
    }

    /// The range statement over the output value commitments, for batching.
    pub fn range_statement(&self) -> Option<RangeStatement<'_>> {
        self.range_proof.as_ref().map(|proof| RangeStatement {
            proof,
            commitments: self.com_output_value.clone(),
            value_base: PEDERSEN.g_value(),
        })
    }

    /// Everything except the transaction signature.
    pub fn verify(&self, rings: &[Vec<Point>], allow_ring_failure: bool) -> Result<()> {
        self.verify_inputs(rings, allow_ring_failure)?;
        self.verify_outputs()?;
        if let Some(statement) = self.range_statement() {
            statement
                .proof
                .verify(&statement.commitments, &statement.value_base)?;
        }
        Ok(())
    }
}
