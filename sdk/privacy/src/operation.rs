//! Curve Operations
//!
//! Thin layer over the Jubjub curve (`ark-ed-on-bls12-381`): canonical
//! 32-byte encodings, domain-separated hashing into scalars and points,
//! and multi-scalar multiplication.
//!
//! ```text
//! hash_to_scalar(domain, parts) = Fr::from_le(blake3_xof(domain; len‖part ...)[..64])
//! hash_to_point(domain, data)   = clear_cofactor(from_x(blake3(domain; data ‖ ctr)))
//! ```

use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ed_on_bls12_381::{EdwardsAffine, EdwardsProjective, Fr};
use ark_ff::{Field, One, PrimeField, UniformRand, Zero};
use ark_serialize::CanonicalDeserialize;
use rand::rngs::OsRng;

use crate::errors::{PrivacyError, Result};

/// A point in the prime-order subgroup of Jubjub
pub type Point = EdwardsProjective;

/// A Jubjub scalar
pub type Scalar = Fr;

pub const POINT_SIZE: usize = 32;
pub const SCALAR_SIZE: usize = 32;

/// Number of shards the ledger is partitioned into
pub const NUM_SHARDS: u8 = 8;

/// Draw a scalar from the operating system CSPRNG.
pub fn random_scalar() -> Scalar {
    Scalar::rand(&mut OsRng)
}

/// Hash any number of byte strings into a scalar.
///
/// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
pub fn hash_to_scalar(domain: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    Scalar::from_le_bytes_mod_order(&wide)
}

/// Try-and-increment hash into the prime-order subgroup.
///
/// The identity is never returned.
pub fn hash_to_point(domain: &str, data: &[u8]) -> Point {
    let mut counter: u32 = 0;
    loop {
        let mut hasher = blake3::Hasher::new_derive_key(domain);
        hasher.update(data);
        hasher.update(&counter.to_le_bytes());
        let candidate: [u8; 32] = *hasher.finalize().as_bytes();

        if let Some(affine) = EdwardsAffine::from_random_bytes(&candidate) {
            let cleared = affine.clear_cofactor().into_group();
            if !cleared.is_zero() {
                return cleared;
            }
        }
        counter = counter.wrapping_add(1);
    }
}

/// Little-endian limbs of a field element; both Jubjub fields fit in 32 bytes.
fn field_to_bytes<F: PrimeField>(value: &F) -> [u8; 32] {
    let bigint = value.into_bigint();
    let limbs: &[u64] = bigint.as_ref();
    let mut out = [0u8; 32];
    for (chunk, limb) in out.chunks_exact_mut(8).zip(limbs) {
        chunk.copy_from_slice(&limb.to_le_bytes());
    }
    out
}

/// Compressed encoding of a point: `y` little-endian, top bit set when `x` is the larger root.
pub fn point_to_bytes(point: &Point) -> [u8; POINT_SIZE] {
    let affine = point.into_affine();
    let mut out = field_to_bytes(&affine.y);
    if affine.x > -affine.x {
        out[POINT_SIZE - 1] |= 0x80;
    }
    out
}

/// Decode a compressed point, rejecting anything outside the prime-order subgroup.
pub fn point_from_bytes(bytes: &[u8]) -> Result<Point> {
    if bytes.len() != POINT_SIZE {
        return Err(PrivacyError::InvalidLength {
            what: "point",
            expected: POINT_SIZE,
            got: bytes.len(),
        });
    }
    EdwardsAffine::deserialize_compressed(bytes)
        .map(|p| p.into_group())
        .map_err(|_| PrivacyError::InvalidPoint)
}

pub fn scalar_to_bytes(scalar: &Scalar) -> [u8; SCALAR_SIZE] {
    field_to_bytes(scalar)
}

/// Decode a scalar, rejecting non-canonical encodings.
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    if bytes.len() != SCALAR_SIZE {
        return Err(PrivacyError::InvalidLength {
            what: "scalar",
            expected: SCALAR_SIZE,
            got: bytes.len(),
        });
    }
    Scalar::deserialize_compressed(bytes).map_err(|_| PrivacyError::InvalidScalar)
}

/// Shard a public key lives on.
pub fn shard_of(public_key: &Point) -> u8 {
    point_to_bytes(public_key)[POINT_SIZE - 1] % NUM_SHARDS
}

pub fn scalar_inverse(scalar: &Scalar) -> Result<Scalar> {
    scalar.inverse().ok_or(PrivacyError::NonInvertible)
}

/// `[1, x, x^2, ..., x^(n-1)]`
pub fn powers(x: &Scalar, n: usize) -> Vec<Scalar> {
    let mut out = Vec::with_capacity(n);
    let mut acc = Scalar::one();
    for _ in 0..n {
        out.push(acc);
        acc *= x;
    }
    out
}

pub fn inner_product(a: &[Scalar], b: &[Scalar]) -> Scalar {
    a.iter().zip(b).fold(Scalar::zero(), |acc, (x, y)| acc + *x * y)
}

/// `Σ scalars[i] · points[i]` in one multi-exponentiation.
pub fn multi_scalar_mul(points: &[Point], scalars: &[Scalar]) -> Point {
    let bases = Point::normalize_batch(points);
    Point::msm_unchecked(&bases, scalars)
}

/// Sum of a slice of points.
pub fn sum_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Point {
    points.into_iter().fold(Point::zero(), |acc, p| acc + p)
}

/// Lowest 64 bits of a scalar, if it fits in a `u64`.
pub fn scalar_to_u64(scalar: &Scalar) -> Option<u64> {
    let bigint = scalar.into_bigint();
    if bigint.0[1..].iter().all(|limb| *limb == 0) {
        Some(bigint.0[0])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::PrimeGroup;
    use ark_serialize::CanonicalSerialize;

    #[test]
    fn test_point_encoding_roundtrip() {
        let p = Point::generator() * random_scalar();
        let bytes = point_to_bytes(&p);
        assert_eq!(point_from_bytes(&bytes).unwrap(), p);
    }

    #[test]
    fn test_encodings_match_compressed_serialization() {
        let mut points = vec![Point::zero(), Point::generator(), -Point::generator()];
        points.extend((0..16).map(|_| Point::generator() * random_scalar()));
        for p in points {
            let mut expected = Vec::new();
            p.into_affine().serialize_compressed(&mut expected).unwrap();
            assert_eq!(point_to_bytes(&p).to_vec(), expected);
        }
        for s in [Scalar::zero(), -Scalar::one(), random_scalar()] {
            let mut expected = Vec::new();
            s.serialize_compressed(&mut expected).unwrap();
            assert_eq!(scalar_to_bytes(&s).to_vec(), expected);
        }
    }

    #[test]
    fn test_point_rejects_garbage() {
        assert!(point_from_bytes(&[0xff; 32]).is_err());
        assert!(matches!(
            point_from_bytes(&[0u8; 31]),
            Err(PrivacyError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_scalar_rejects_non_canonical() {
        assert_eq!(
            scalar_from_bytes(&[0xff; 32]),
            Err(PrivacyError::InvalidScalar)
        );
        let s = random_scalar();
        assert_eq!(scalar_from_bytes(&scalar_to_bytes(&s)).unwrap(), s);
    }

    #[test]
    fn test_hash_to_point_is_deterministic_and_domain_separated() {
        let a = hash_to_point("obscura test", b"data");
        let b = hash_to_point("obscura test", b"data");
        let c = hash_to_point("obscura other", b"data");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn test_hash_to_scalar_length_prefix() {
        let a = hash_to_scalar("obscura test", &[b"ab", b"c"]);
        let b = hash_to_scalar("obscura test", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_msm_matches_naive() {
        let points: Vec<Point> = (0..5).map(|_| Point::generator() * random_scalar()).collect();
        let scalars: Vec<Scalar> = (0..5).map(|_| random_scalar()).collect();
        let naive = points
            .iter()
            .zip(&scalars)
            .fold(Point::zero(), |acc, (p, s)| acc + *p * s);
        assert_eq!(multi_scalar_mul(&points, &scalars), naive);
    }

    #[test]
    fn test_scalar_to_u64() {
        assert_eq!(scalar_to_u64(&Scalar::from(42u64)), Some(42));
        assert_eq!(scalar_to_u64(&-Scalar::one()), None);
    }

    #[test]
    fn test_shard_in_range() {
        for _ in 0..16 {
            let p = Point::generator() * random_scalar();
            assert!(shard_of(&p) < NUM_SHARDS);
        }
    }
}
