//! Conversion proof: plain v1 coins in, v2 coins out.
//!
//! Inputs are public (value, randomness and owner visible) and reveal their
//! serial numbers with a no-privacy proof. Outputs are ordinary concealed v2
//! coins under a range proof. Balance is a single-base Schnorr signature:
//!
//! ```text
//! B = Σ C_out − (Σ v_in − fee)·Gv = (Σ r_out)·Gr
//! ```

use ark_ff::Zero;

use crate::bulletproofs::{AggregatedRangeProof, RangeStatement};
use crate::coin::{CoinV1, CoinV2};
use crate::errors::{PrivacyError, Result};
use crate::generators::{MAX_AGGREGATED_OUTPUTS, PEDERSEN};
use crate::keys::SpendingKey;
use crate::operation::{Point, Scalar, hash_to_scalar, point_to_bytes, scalar_to_bytes, sum_points};
use crate::proof::v2::OutputV2;
use crate::schnorr::{SchnorrPrivateKey, SchnorrPublicKey, SchnorrSignature};
use crate::serial_number::SerialNumberNoPrivacyProof;

const BALANCE_DOMAIN: &str = "obscura 2025 conversion balance";

/// Most inputs a conversion may spend
pub const MAX_CONVERSION_INPUTS: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionProof {
    /// Spent coins with their serial numbers set
    pub input_coins: Vec<CoinV1>,
    pub serial_number_proofs: Vec<SerialNumberNoPrivacyProof>,
    pub output_coins: Vec<CoinV2>,
    pub range_proof: AggregatedRangeProof,
    pub balance_signature: SchnorrSignature,
}

fn balance_message(outputs: &[CoinV2]) -> [u8; 32] {
    let encoded: Vec<[u8; 32]> = outputs.iter().map(|c| point_to_bytes(&c.commitment)).collect();
    let parts: Vec<&[u8]> = encoded.iter().map(|b| b.as_slice()).collect();
    scalar_to_bytes(&hash_to_scalar(BALANCE_DOMAIN, &parts))
}

impl ConversionProof {
    pub fn prove(
        spending_key: &SpendingKey,
        inputs: &[CoinV1],
        outputs: &[OutputV2],
        fee: u64,
    ) -> Result<Self> {
        if inputs.is_empty() || inputs.len() > MAX_CONVERSION_INPUTS {
            return Err(PrivacyError::MalformedProof(format!(
                "conversion spends 1 to {} inputs, got {}",
                MAX_CONVERSION_INPUTS,
                inputs.len()
            )));
        }
        if outputs.is_empty() || outputs.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: outputs.len(),
            });
        }

        let public_key = spending_key.public_key();
        let mut input_coins = Vec::with_capacity(inputs.len());
        let mut serial_number_proofs = Vec::with_capacity(inputs.len());
        let mut input_sum: u64 = 0;
        for coin in inputs {
            if coin.public_key != public_key {
                return Err(PrivacyError::VerificationFailed("coin ownership"));
            }
            coin.verify_commitment()?;
            let value = coin.value.ok_or(PrivacyError::MissingField("value"))?;
            input_sum = input_sum.checked_add(value).ok_or(PrivacyError::ValueOverflow)?;

            let serial_number = coin.derive_serial_number(spending_key)?;
            serial_number_proofs.push(SerialNumberNoPrivacyProof::prove(
                &public_key,
                &coin.snd,
                &serial_number,
                spending_key.scalar(),
            ));
            let mut spent = coin.clone();
            spent.serial_number = Some(serial_number);
            input_coins.push(spent);
        }

        let mut output_sum: u64 = 0;
        let mut values = Vec::with_capacity(outputs.len());
        let mut randomness = Vec::with_capacity(outputs.len());
        let mut output_coins = Vec::with_capacity(outputs.len());
        for output in outputs {
            if output.coin.asset_tag.is_some() {
                return Err(PrivacyError::MalformedProof(
                    "conversion outputs are native coins".into(),
                ));
            }
            let value = output.coin.value.ok_or(PrivacyError::MissingField("value"))?;
            let r = output
                .coin
                .randomness
                .ok_or(PrivacyError::MissingField("randomness"))?;
            output_sum = output_sum.checked_add(value).ok_or(PrivacyError::ValueOverflow)?;
            values.push(value);
            randomness.push(r);

            let mut sealed = output.coin.clone();
            if !sealed.is_burning() {
                sealed.conceal(&output.shared_secret)?;
            }
            output_coins.push(sealed);
        }
        let spent = output_sum.checked_add(fee).ok_or(PrivacyError::ValueOverflow)?;
        if spent != input_sum {
            return Err(PrivacyError::VerificationFailed("value conservation"));
        }

        let range_proof = AggregatedRangeProof::prove(&values, &randomness, &PEDERSEN.g_value())?;
        let r_out: Scalar = randomness.iter().sum();
        let balance_key =
            SchnorrPrivateKey::with_bases(r_out, None, PEDERSEN.g_rand(), PEDERSEN.g_rand());
        let balance_signature = balance_key.sign(&balance_message(&output_coins));

        Ok(Self {
            input_coins,
            serial_number_proofs,
            output_coins,
            range_proof,
            balance_signature,
        })
    }

    pub fn check_shape(&self) -> Result<()> {
        let n_in = self.input_coins.len();
        if n_in == 0 || n_in > MAX_CONVERSION_INPUTS || self.serial_number_proofs.len() != n_in {
            return Err(PrivacyError::MalformedProof(
                "conversion inputs and serial-number proofs differ".into(),
            ));
        }
        if self.output_coins.is_empty() || self.output_coins.len() > MAX_AGGREGATED_OUTPUTS {
            return Err(PrivacyError::RangeProofSize {
                max: MAX_AGGREGATED_OUTPUTS,
                got: self.output_coins.len(),
            });
        }
        if self.input_coins.iter().any(|c| c.serial_number.is_none() || c.is_concealed()) {
            return Err(PrivacyError::MalformedProof(
                "conversion inputs must be public and carry serial numbers".into(),
            ));
        }
        if self.output_coins.iter().any(|c| c.asset_tag.is_some()) {
            return Err(PrivacyError::MalformedProof(
                "conversion outputs are native coins".into(),
            ));
        }
        Ok(())
    }

    /// Sum of the public input values.
    pub fn input_sum(&self) -> Result<u64> {
        self.input_coins.iter().try_fold(0u64, |acc, c| {
            let v = c.value.ok_or(PrivacyError::MissingField("value"))?;
            acc.checked_add(v).ok_or(PrivacyError::ValueOverflow)
        })
    }

    pub fn range_statement(&self) -> RangeStatement<'_> {
        RangeStatement {
            proof: &self.range_proof,
            commitments: self.output_coins.iter().map(|c| c.commitment).collect(),
            value_base: PEDERSEN.g_value(),
        }
    }

    /// Everything except the range proof.
    ///
    /// `owner` is the public key the transaction is signed with.
    pub fn verify_except_range(&self, owner: &Point, fee: u64) -> Result<()> {
        self.check_shape()?;
        for (coin, proof) in self.input_coins.iter().zip(&self.serial_number_proofs) {
            if coin.public_key != *owner {
                return Err(PrivacyError::VerificationFailed("coin ownership"));
            }
            coin.verify_commitment()?;
            let serial_number = coin
                .serial_number
                .ok_or(PrivacyError::MissingField("serial number"))?;
            proof.verify(&coin.public_key, &coin.snd, &serial_number)?;
        }
        for coin in &self.output_coins {
            coin.verify_commitment()?;
        }

        let input_sum = self.input_sum()?;
        let converted = input_sum
            .checked_sub(fee)
            .ok_or(PrivacyError::VerificationFailed("value conservation"))?;
        let out_sum = sum_points(self.output_coins.iter().map(|c| &c.commitment));
        let balance = out_sum - PEDERSEN.g_value() * Scalar::from(converted);
        if balance.is_zero() {
            return Err(PrivacyError::VerificationFailed("conversion balance"));
        }
        SchnorrPublicKey::with_bases(balance, PEDERSEN.g_rand(), PEDERSEN.g_rand())
            .verify(&self.balance_signature, &balance_message(&self.output_coins))
    }

    pub fn verify(&self, owner: &Point, fee: u64) -> Result<()> {
        self.verify_except_range(owner, fee)?;
        let statement = self.range_statement();
        statement
            .proof
            .verify(&statement.commitments, &statement.value_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeySet, PaymentInfo};
    use crate::operation::random_scalar;

    fn v2_output(to: &KeySet, amount: u64, index: u32) -> OutputV2 {
        let (coin, shared) = CoinV2::derive(
            &PaymentInfo::new(to.payment_address, amount),
            index,
            &random_scalar(),
            None,
            false,
        );
        OutputV2 {
            coin,
            shared_secret: shared,
            asset_blinder: Scalar::zero(),
        }
    }

    #[test]
    fn test_convert_and_verify() {
        let owner = KeySet::random();
        let inputs = vec![
            CoinV1::new(&owner.payment_address, 40, Vec::new()),
            CoinV1::new(&owner.payment_address, 60, Vec::new()),
        ];
        let outputs = vec![v2_output(&owner, 95, 0)];
        let proof = ConversionProof::prove(&owner.spending_key, &inputs, &outputs, 5).unwrap();

        let pk = owner.payment_address.public_key;
        assert!(proof.verify(&pk, 5).is_ok());
        assert!(proof.verify(&pk, 4).is_err());
        assert!(proof.verify(&KeySet::random().payment_address.public_key, 5).is_err());
        assert!(proof.output_coins[0].reveal(&owner).is_ok());
    }

    #[test]
    fn test_foreign_input_refused() {
        let owner = KeySet::random();
        let other = KeySet::random();
        let inputs = vec![CoinV1::new(&other.payment_address, 10, Vec::new())];
        let outputs = vec![v2_output(&owner, 10, 0)];
        assert!(ConversionProof::prove(&owner.spending_key, &inputs, &outputs, 0).is_err());
    }

    #[test]
    fn test_inflating_conversion_refused() {
        let owner = KeySet::random();
        let inputs = vec![CoinV1::new(&owner.payment_address, 10, Vec::new())];
        let outputs = vec![v2_output(&owner, 11, 0)];
        assert!(ConversionProof::prove(&owner.spending_key, &inputs, &outputs, 0).is_err());
    }
}
