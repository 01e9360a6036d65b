//! Version-2 coins
//!
//! ```text
//! sender:     R = r·G,  shared = r·TK
//! recipient:  shared = rk·R
//! OTA         = H(shared ‖ i)·G + PK          coin key x = H(shared ‖ i) + sk
//! key image   = x·Hp(OTA)
//! asset tag   = Hp(token) + bl·Gr,  bl = H'(shared ‖ i)
//! commitment  = v·(asset tag | Gv) + r·Gr
//! ```

use ark_ff::Zero;
use serde::{Deserialize, Serialize};

use crate::coin::encryption::{self, EncryptedPayload, Opening};
use crate::coin::{TokenId, is_burning_key};
use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::keys::{KeySet, PaymentInfo};
use crate::operation::{
    Point, Scalar, hash_to_point, hash_to_scalar, point_to_bytes, random_scalar, shard_of,
};
use crate::serde_utils;

const OTA_DOMAIN: &str = "obscura 2025 one-time address";
const ASSET_BLINDER_DOMAIN: &str = "obscura 2025 asset blinder";
const ASSET_BASE_DOMAIN: &str = "obscura 2025 asset";
const KEY_IMAGE_DOMAIN: &str = "obscura 2025 key image";

/// Transaction randomness for one output: `R = r·G` and the output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRandom {
    #[serde(with = "serde_utils::point")]
    pub point: Point,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinV2 {
    #[serde(with = "serde_utils::point")]
    pub public_key: Point,
    #[serde(with = "serde_utils::point")]
    pub commitment: Point,
    pub tx_random: TxRandom,
    #[serde(with = "serde_utils::point_opt")]
    pub asset_tag: Option<Point>,
    pub value: Option<u64>,
    #[serde(with = "serde_utils::scalar_opt")]
    pub randomness: Option<Scalar>,
    #[serde(with = "hex")]
    pub info: Vec<u8>,
    pub payload: Option<EncryptedPayload>,
    #[serde(with = "serde_utils::point_opt")]
    pub key_image: Option<Point>,
}

/// `H(shared ‖ index)`, the one-time-address offset
pub fn ota_offset(shared: &Point, index: u32) -> Scalar {
    hash_to_scalar(OTA_DOMAIN, &[&point_to_bytes(shared), &index.to_le_bytes()])
}

/// Blinder applied to a token's base asset tag
pub fn asset_blinder(shared: &Point, index: u32) -> Scalar {
    hash_to_scalar(ASSET_BLINDER_DOMAIN, &[&point_to_bytes(shared), &index.to_le_bytes()])
}

/// Unblinded asset tag of a token
pub fn asset_base(token_id: &TokenId) -> Point {
    hash_to_point(ASSET_BASE_DOMAIN, token_id.as_bytes())
}

/// `Hp(P)`, the base for key images
pub fn key_image_base(public_key: &Point) -> Point {
    hash_to_point(KEY_IMAGE_DOMAIN, &point_to_bytes(public_key))
}

impl CoinV2 {
    /// Derive a plaintext output coin from the sender randomness `r`.
    ///
    /// Returns the coin and the ECDH shared secret. With `asset = Some(..)`
    /// the coin carries a blinded asset tag; `blind_asset = false` keeps the
    /// bare `Hp(token)` tag used by public mints.
    pub fn derive(
        payment: &PaymentInfo,
        index: u32,
        r: &Scalar,
        asset: Option<&TokenId>,
        blind_asset: bool,
    ) -> (CoinV2, Point) {
        let address = &payment.address;
        let shared = address.transmission_key * r;
        let public_key = if is_burning_key(&address.public_key) {
            address.public_key
        } else {
            PEDERSEN.g_pk() * ota_offset(&shared, index) + address.public_key
        };

        let asset_tag = asset.map(|token| {
            let base = asset_base(token);
            if blind_asset {
                base + PEDERSEN.g_rand() * asset_blinder(&shared, index)
            } else {
                base
            }
        });

        let randomness = random_scalar();
        let commitment = Self::commit(payment.amount, &randomness, asset_tag.as_ref());

        let coin = CoinV2 {
            public_key,
            commitment,
            tx_random: TxRandom {
                point: PEDERSEN.g_pk() * r,
                index,
            },
            asset_tag,
            value: Some(payment.amount),
            randomness: Some(randomness),
            info: payment.message.clone(),
            payload: None,
            key_image: None,
        };
        (coin, shared)
    }

    pub fn commit(value: u64, randomness: &Scalar, asset_tag: Option<&Point>) -> Point {
        let base = asset_tag.copied().unwrap_or_else(|| PEDERSEN.g_value());
        base * Scalar::from(value) + PEDERSEN.g_rand() * randomness
    }

    /// Base the value is committed under.
    pub fn value_base(&self) -> Point {
        self.asset_tag.unwrap_or_else(|| PEDERSEN.g_value())
    }

    pub fn shard(&self) -> u8 {
        shard_of(&self.public_key)
    }

    pub fn is_concealed(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_burning(&self) -> bool {
        is_burning_key(&self.public_key)
    }

    pub fn verify_commitment(&self) -> Result<()> {
        let (Some(value), Some(randomness)) = (self.value, self.randomness) else {
            return Ok(());
        };
        if Self::commit(value, &randomness, self.asset_tag.as_ref()) == self.commitment {
            Ok(())
        } else {
            Err(PrivacyError::CommitmentMismatch)
        }
    }

    /// Encrypt the opening under the sender's shared secret and strip it.
    pub fn conceal(&mut self, shared: &Point) -> Result<()> {
        let value = self.value.ok_or(PrivacyError::MissingField("value"))?;
        let randomness = self.randomness.ok_or(PrivacyError::MissingField("randomness"))?;
        let payload = encryption::seal(
            shared,
            &self.payload_context(),
            &Opening {
                value,
                randomness,
                message: std::mem::take(&mut self.info),
            },
        )?;
        self.payload = Some(payload);
        self.value = None;
        self.randomness = None;
        Ok(())
    }

    fn payload_context(&self) -> Vec<u8> {
        let mut ctx = point_to_bytes(&self.public_key).to_vec();
        ctx.extend_from_slice(&self.tx_random.index.to_le_bytes());
        ctx
    }

    pub fn shared_secret(&self, keyset: &KeySet) -> Point {
        self.tx_random.point * keyset.receiving_key.scalar()
    }

    pub fn belongs_to(&self, keyset: &KeySet) -> bool {
        let shared = self.shared_secret(keyset);
        let expected = PEDERSEN.g_pk() * ota_offset(&shared, self.tx_random.index)
            + keyset.payment_address.public_key;
        expected == self.public_key
    }

    /// Private key `x` with `OTA = x·G`.
    pub fn private_key(&self, keyset: &KeySet) -> Result<Scalar> {
        if !self.belongs_to(keyset) {
            return Err(PrivacyError::VerificationFailed("coin ownership"));
        }
        let shared = self.shared_secret(keyset);
        Ok(ota_offset(&shared, self.tx_random.index) + keyset.spending_key.scalar())
    }

    pub fn derive_key_image(&self, keyset: &KeySet) -> Result<Point> {
        let x = self.private_key(keyset)?;
        Ok(key_image_base(&self.public_key) * x)
    }

    /// Decrypt a concealed coin and check its opening.
    pub fn reveal(&self, keyset: &KeySet) -> Result<CoinV2> {
        if !self.belongs_to(keyset) {
            return Err(PrivacyError::DecryptError);
        }
        let mut revealed = self.clone();
        if let Some(payload) = &self.payload {
            let shared = self.shared_secret(keyset);
            let opening = encryption::open(&shared, &self.payload_context(), payload)?;
            revealed.value = Some(opening.value);
            revealed.randomness = Some(opening.randomness);
            revealed.info = opening.message;
            revealed.payload = None;
        }
        if revealed.is_concealed() {
            return Err(PrivacyError::DecryptError);
        }
        revealed
            .verify_commitment()
            .map_err(|_| PrivacyError::DecryptError)?;
        Ok(revealed)
    }

    /// Blinder of this coin's asset tag relative to `Hp(token)`.
    ///
    /// Public mints carry the bare tag, so their blinder is zero.
    pub fn asset_blinder(&self, keyset: &KeySet, token_id: &TokenId) -> Result<Scalar> {
        let tag = self.asset_tag.ok_or(PrivacyError::MissingField("asset tag"))?;
        let base = asset_base(token_id);
        if tag == base {
            return Ok(Scalar::zero());
        }
        let bl = asset_blinder(&self.shared_secret(keyset), self.tx_random.index);
        if base + PEDERSEN.g_rand() * bl == tag {
            Ok(bl)
        } else {
            Err(PrivacyError::CommitmentMismatch)
        }
    }
}
