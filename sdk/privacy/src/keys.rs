//! Keys
//!
//! ```text
//! spending key   sk                 (spends coins, derives serial numbers / key images)
//! receiving key  rk = H(sk)         (opens encrypted payloads, recognises one-time addresses)
//! address        (PK = sk·G, TK = rk·G)
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::operation::{
    POINT_SIZE, Point, Scalar, hash_to_scalar, point_from_bytes, point_to_bytes, random_scalar,
    scalar_from_bytes, scalar_to_bytes, shard_of,
};
use crate::serde_utils;

const RECEIVING_KEY_DOMAIN: &str = "obscura 2025 receiving key";

/// Spending key - allows spending coins
///
/// Loss = loss of funds. Compromise = theft of funds.
#[derive(Clone, PartialEq, Eq)]
pub struct SpendingKey(Scalar);

impl SpendingKey {
    pub fn random() -> Self {
        Self(random_scalar())
    }

    pub fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        scalar_from_bytes(bytes).map(Self)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        scalar_to_bytes(&self.0)
    }

    pub fn scalar(&self) -> &Scalar {
        &self.0
    }

    pub fn public_key(&self) -> Point {
        PEDERSEN.g_pk() * self.0
    }

    pub fn receiving_key(&self) -> ReceivingKey {
        ReceivingKey(hash_to_scalar(RECEIVING_KEY_DOMAIN, &[&self.to_bytes()]))
    }
}

impl std::fmt::Debug for SpendingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SpendingKey(..)")
    }
}

/// Receiving key - opens payloads and scans for owned coins, cannot spend
#[derive(Clone, PartialEq, Eq)]
pub struct ReceivingKey(Scalar);

impl ReceivingKey {
    pub fn scalar(&self) -> &Scalar {
        &self.0
    }

    pub fn transmission_key(&self) -> Point {
        PEDERSEN.g_pk() * self.0
    }
}

impl std::fmt::Debug for ReceivingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReceivingKey(..)")
    }
}

/// Public payment address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAddress {
    #[serde(with = "serde_utils::point")]
    pub public_key: Point,
    #[serde(with = "serde_utils::point")]
    pub transmission_key: Point,
}

impl PaymentAddress {
    pub const SIZE: usize = 2 * POINT_SIZE;

    pub fn shard(&self) -> u8 {
        shard_of(&self.public_key)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..POINT_SIZE].copy_from_slice(&point_to_bytes(&self.public_key));
        out[POINT_SIZE..].copy_from_slice(&point_to_bytes(&self.transmission_key));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(PrivacyError::InvalidLength {
                what: "payment address",
                expected: Self::SIZE,
                got: bytes.len(),
            });
        }
        Ok(Self {
            public_key: point_from_bytes(&bytes[..POINT_SIZE])?,
            transmission_key: point_from_bytes(&bytes[POINT_SIZE..])?,
        })
    }
}

/// Full key bundle for a wallet
#[derive(Debug, Clone)]
pub struct KeySet {
    pub spending_key: SpendingKey,
    pub receiving_key: ReceivingKey,
    pub payment_address: PaymentAddress,
}

impl KeySet {
    pub fn random() -> Self {
        Self::from_spending_key(SpendingKey::random())
    }

    pub fn from_spending_key(spending_key: SpendingKey) -> Self {
        let receiving_key = spending_key.receiving_key();
        let payment_address = PaymentAddress {
            public_key: spending_key.public_key(),
            transmission_key: receiving_key.transmission_key(),
        };
        Self {
            spending_key,
            receiving_key,
            payment_address,
        }
    }

    /// Generate a key set whose address lives on `shard`.
    pub fn random_in_shard(shard: u8) -> Self {
        loop {
            let ks = Self::random();
            if ks.shard() == shard {
                return ks;
            }
        }
    }

    pub fn shard(&self) -> u8 {
        self.payment_address.shard()
    }
}

/// Recipient and amount of one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    pub address: PaymentAddress,
    pub amount: u64,
    pub message: Vec<u8>,
}

impl PaymentInfo {
    pub fn new(address: PaymentAddress, amount: u64) -> Self {
        Self {
            address,
            amount,
            message: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: Vec<u8>) -> Self {
        self.message = message;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyset_derivation_deterministic() {
        let sk = SpendingKey::random();
        let a = KeySet::from_spending_key(sk.clone());
        let b = KeySet::from_spending_key(sk);
        assert_eq!(a.payment_address, b.payment_address);
        assert_ne!(a.payment_address.public_key, a.payment_address.transmission_key);
    }

    #[test]
    fn test_address_roundtrip() {
        let ks = KeySet::random();
        let bytes = ks.payment_address.to_bytes();
        assert_eq!(PaymentAddress::from_bytes(&bytes).unwrap(), ks.payment_address);
        assert!(PaymentAddress::from_bytes(&bytes[..40]).is_err());
    }

    #[test]
    fn test_random_in_shard() {
        let ks = KeySet::random_in_shard(3);
        assert_eq!(ks.shard(), 3);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let sk = SpendingKey::random();
        assert_eq!(format!("{:?}", sk), "SpendingKey(..)");
    }
}
