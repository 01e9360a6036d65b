//! Version-1 coins
//!
//! ```text
//! C  = PK + v·Gv + snd·Gsnd + shard·Gsh + r·Gr
//! SN = (sk + snd)^-1 · G
//! ```
//!
//! The owner key is the recipient's long-lived public key; the serial-number
//! derivator `snd` makes every coin's serial number distinct.

use ark_ff::Zero;
use serde::{Deserialize, Serialize};

use crate::coin::encryption::{self, EncryptedPayload, Opening};
use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::keys::{KeySet, PaymentAddress, SpendingKey};
use crate::operation::{
    Point, Scalar, point_to_bytes, random_scalar, scalar_inverse, shard_of,
};
use crate::serde_utils;

/// Ephemeral key plus ciphertext for a concealed v1 coin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedOpeningV1 {
    #[serde(with = "serde_utils::point")]
    pub ephemeral_key: Point,
    pub payload: EncryptedPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinV1 {
    #[serde(with = "serde_utils::point")]
    pub public_key: Point,
    #[serde(with = "serde_utils::point")]
    pub commitment: Point,
    #[serde(with = "serde_utils::scalar")]
    pub snd: Scalar,
    pub value: Option<u64>,
    #[serde(with = "serde_utils::scalar_opt")]
    pub randomness: Option<Scalar>,
    #[serde(with = "hex")]
    pub info: Vec<u8>,
    pub sealed: Option<SealedOpeningV1>,
    #[serde(with = "serde_utils::point_opt")]
    pub serial_number: Option<Point>,
}

impl CoinV1 {
    /// Build a plaintext coin for `address`.
    pub fn new(address: &PaymentAddress, value: u64, info: Vec<u8>) -> Self {
        Self::with_opening(address.public_key, value, random_scalar(), random_scalar(), info)
    }

    pub fn with_opening(
        public_key: Point,
        value: u64,
        snd: Scalar,
        randomness: Scalar,
        info: Vec<u8>,
    ) -> Self {
        let commitment = Self::commit(&public_key, value, &snd, &randomness);
        Self {
            public_key,
            commitment,
            snd,
            value: Some(value),
            randomness: Some(randomness),
            info,
            sealed: None,
            serial_number: None,
        }
    }

    pub fn commit(public_key: &Point, value: u64, snd: &Scalar, randomness: &Scalar) -> Point {
        *public_key
            + PEDERSEN.g_value() * Scalar::from(value)
            + Self::public_part(public_key, snd)
            + PEDERSEN.g_rand() * randomness
    }

    /// `snd·Gsnd + shard·Gsh`, the part of the commitment anyone can recompute
    fn public_part(public_key: &Point, snd: &Scalar) -> Point {
        PEDERSEN.g_snd() * snd + PEDERSEN.g_shard() * Scalar::from(shard_of(public_key) as u64)
    }

    pub fn shard(&self) -> u8 {
        shard_of(&self.public_key)
    }

    pub fn is_concealed(&self) -> bool {
        self.value.is_none()
    }

    /// Recompute the commitment from the plaintext opening.
    ///
    /// Concealed coins carry no public opening; their commitment is bound by
    /// [`verify_with_value_commitment`](Self::verify_with_value_commitment) instead.
    pub fn verify_commitment(&self) -> Result<()> {
        let (Some(value), Some(randomness)) = (self.value, self.randomness) else {
            return Ok(());
        };
        if Self::commit(&self.public_key, value, &self.snd, &randomness) == self.commitment {
            Ok(())
        } else {
            Err(PrivacyError::CommitmentMismatch)
        }
    }

    /// Check `C == PK + com_value + snd·Gsnd + shard·Gsh`, where
    /// `com_value = v·Gv + r·Gr` is carried by the payment proof.
    pub fn verify_with_value_commitment(&self, com_value: &Point) -> Result<()> {
        let expected = self.public_key + com_value + Self::public_part(&self.public_key, &self.snd);
        if expected == self.commitment {
            Ok(())
        } else {
            Err(PrivacyError::CommitmentMismatch)
        }
    }

    /// `v·Gv + r·Gr` for a plaintext coin
    pub fn value_commitment(&self) -> Result<Point> {
        let value = self.value.ok_or(PrivacyError::MissingField("value"))?;
        let randomness = self.randomness.ok_or(PrivacyError::MissingField("randomness"))?;
        Ok(PEDERSEN.g_value() * Scalar::from(value) + PEDERSEN.g_rand() * randomness)
    }

    /// Encrypt the opening to `transmission_key` and strip the plaintext.
    pub fn conceal(&mut self, transmission_key: &Point) -> Result<()> {
        let value = self.value.ok_or(PrivacyError::MissingField("value"))?;
        let randomness = self.randomness.ok_or(PrivacyError::MissingField("randomness"))?;

        let ephemeral = random_scalar();
        let shared = *transmission_key * ephemeral;
        let payload = encryption::seal(
            &shared,
            &point_to_bytes(&self.commitment),
            &Opening {
                value,
                randomness,
                message: std::mem::take(&mut self.info),
            },
        )?;

        self.sealed = Some(SealedOpeningV1 {
            ephemeral_key: PEDERSEN.g_pk() * ephemeral,
            payload,
        });
        self.value = None;
        self.randomness = None;
        Ok(())
    }

    pub fn belongs_to(&self, keyset: &KeySet) -> bool {
        self.public_key == keyset.payment_address.public_key
    }

    /// Decrypt a concealed coin and check the opening against the commitment.
    pub fn reveal(&self, keyset: &KeySet) -> Result<CoinV1> {
        let mut revealed = self.clone();
        if let Some(sealed) = &self.sealed {
            let shared = sealed.ephemeral_key * keyset.receiving_key.scalar();
            let opening =
                encryption::open(&shared, &point_to_bytes(&self.commitment), &sealed.payload)?;
            revealed.value = Some(opening.value);
            revealed.randomness = Some(opening.randomness);
            revealed.info = opening.message;
            revealed.sealed = None;
        }
        if revealed.is_concealed() {
            return Err(PrivacyError::DecryptError);
        }
        revealed
            .verify_commitment()
            .map_err(|_| PrivacyError::DecryptError)?;
        Ok(revealed)
    }

    /// `SN = (sk + snd)^-1 · G`
    pub fn derive_serial_number(&self, spending_key: &SpendingKey) -> Result<Point> {
        let exponent = *spending_key.scalar() + self.snd;
        if exponent.is_zero() {
            return Err(PrivacyError::NonInvertible);
        }
        Ok(PEDERSEN.g_pk() * scalar_inverse(&exponent)?)
    }
}
