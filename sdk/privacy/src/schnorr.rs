//! Schnorr signatures over one or two bases.
//!
//! ```text
//! key    P = sk·G (+ r·H)
//! sign   t = k1·G (+ k2·H),  e = H(P ‖ t ‖ m),  z1 = k1 - e·sk,  z2 = k2 - e·r
//! verify e == H(P ‖ z1·G + z2·H + e·P ‖ m)
//! ```
//!
//! The two-base form signs v1 transactions, where `r` is the blinding left
//! over once input and output value commitments cancel.

use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::operation::{
    Point, SCALAR_SIZE, Scalar, hash_to_scalar, point_to_bytes, random_scalar, scalar_from_bytes,
    scalar_to_bytes,
};

const SCHNORR_DOMAIN: &str = "obscura 2025 schnorr";

#[derive(Clone)]
pub struct SchnorrPrivateKey {
    sk: Scalar,
    randomness: Option<Scalar>,
    g: Point,
    h: Point,
    public_key: Point,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchnorrSignature {
    pub e: Scalar,
    pub z1: Scalar,
    pub z2: Option<Scalar>,
}

impl SchnorrPrivateKey {
    /// Key over `G_PK` and, when `randomness` is set, `G_RAND`.
    pub fn new(sk: Scalar, randomness: Option<Scalar>) -> Self {
        Self::with_bases(sk, randomness, PEDERSEN.g_pk(), PEDERSEN.g_rand())
    }

    pub fn with_bases(sk: Scalar, randomness: Option<Scalar>, g: Point, h: Point) -> Self {
        let mut public_key = g * sk;
        if let Some(r) = randomness {
            public_key += h * r;
        }
        Self {
            sk,
            randomness,
            g,
            h,
            public_key,
        }
    }

    pub fn public_key(&self) -> &Point {
        &self.public_key
    }

    pub fn sign(&self, message: &[u8]) -> SchnorrSignature {
        let k1 = random_scalar();
        let k2 = self.randomness.map(|_| random_scalar());

        let mut t = self.g * k1;
        if let Some(k2) = k2 {
            t += self.h * k2;
        }
        let e = challenge(&self.public_key, &t, message);

        SchnorrSignature {
            e,
            z1: k1 - e * self.sk,
            z2: k2.zip(self.randomness).map(|(k2, r)| k2 - e * r),
        }
    }
}

fn challenge(public_key: &Point, t: &Point, message: &[u8]) -> Scalar {
    hash_to_scalar(
        SCHNORR_DOMAIN,
        &[&point_to_bytes(public_key), &point_to_bytes(t), message],
    )
}

/// Public key plus the bases it was formed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchnorrPublicKey {
    pub key: Point,
    pub g: Point,
    pub h: Point,
}

impl SchnorrPublicKey {
    pub fn new(key: Point) -> Self {
        Self::with_bases(key, PEDERSEN.g_pk(), PEDERSEN.g_rand())
    }

    pub fn with_bases(key: Point, g: Point, h: Point) -> Self {
        Self { key, g, h }
    }

    pub fn verify(&self, signature: &SchnorrSignature, message: &[u8]) -> Result<()> {
        let mut t = self.g * signature.z1 + self.key * signature.e;
        if let Some(z2) = signature.z2 {
            t += self.h * z2;
        }
        if challenge(&self.key, &t, message) == signature.e {
            Ok(())
        } else {
            Err(PrivacyError::VerificationFailed("Schnorr signature"))
        }
    }
}

impl SchnorrSignature {
    /// `e ‖ z1 (‖ z2)`: 64 or 96 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * SCALAR_SIZE);
        out.extend_from_slice(&scalar_to_bytes(&self.e));
        out.extend_from_slice(&scalar_to_bytes(&self.z1));
        if let Some(z2) = &self.z2 {
            out.extend_from_slice(&scalar_to_bytes(z2));
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            64 | 96 => {}
            got => {
                return Err(PrivacyError::InvalidLength {
                    what: "Schnorr signature",
                    expected: 96,
                    got,
                });
            }
        }
        Ok(Self {
            e: scalar_from_bytes(&bytes[..32])?,
            z1: scalar_from_bytes(&bytes[32..64])?,
            z2: if bytes.len() == 96 {
                Some(scalar_from_bytes(&bytes[64..])?)
            } else {
                None
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_base_sign_verify() {
        let key = SchnorrPrivateKey::new(random_scalar(), None);
        let sig = key.sign(b"msg");
        let public = SchnorrPublicKey::new(*key.public_key());
        assert!(public.verify(&sig, b"msg").is_ok());
        assert!(public.verify(&sig, b"other").is_err());
        assert!(sig.z2.is_none());
    }

    #[test]
    fn test_two_base_sign_verify() {
        let key = SchnorrPrivateKey::new(random_scalar(), Some(random_scalar()));
        let sig = key.sign(b"msg");
        let public = SchnorrPublicKey::new(*key.public_key());
        assert!(public.verify(&sig, b"msg").is_ok());

        let wrong = SchnorrPublicKey::new(*key.public_key() + PEDERSEN.g_rand());
        assert!(wrong.verify(&sig, b"msg").is_err());
    }

    #[test]
    fn test_custom_base_key() {
        let h = PEDERSEN.g_rand();
        let key = SchnorrPrivateKey::with_bases(random_scalar(), None, h, h);
        let sig = key.sign(b"balance");
        assert!(
            SchnorrPublicKey::with_bases(*key.public_key(), h, h)
                .verify(&sig, b"balance")
                .is_ok()
        );
    }

    #[test]
    fn test_signature_bytes_roundtrip() {
        let key = SchnorrPrivateKey::new(random_scalar(), Some(random_scalar()));
        let sig = key.sign(b"msg");
        assert_eq!(SchnorrSignature::from_bytes(&sig.to_bytes()).unwrap(), sig);
        assert!(SchnorrSignature::from_bytes(&[0u8; 50]).is_err());
    }
}
