//! Pedersen and Bulletproof Generators
//!
//! All generators are nothing-up-my-sleeve points derived with
//! [`hash_to_point`], except `G_PK` which is the curve's standard generator.
//!
//! ```text
//! v1 coin:  C = PK + v·G_VALUE + snd·G_SND + shard·G_SHARD + r·G_RAND
//! v2 coin:  C = v·(G_VALUE | asset tag) + r·G_RAND
//! ```

use std::sync::LazyLock;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bls12_381::{EdwardsAffine, EdwardsProjective};

use crate::operation::{Point, Scalar, hash_to_point};

pub const PEDERSEN_PK: usize = 0;
pub const PEDERSEN_VALUE: usize = 1;
pub const PEDERSEN_SND: usize = 2;
pub const PEDERSEN_SHARD: usize = 3;
pub const PEDERSEN_RAND: usize = 4;

/// Bits per range-proof value
pub const RANGE_BITS: usize = 64;
/// Maximum number of outputs in one aggregated range proof
pub const MAX_AGGREGATED_OUTPUTS: usize = 32;

const GENERATOR_DOMAIN: &str = "obscura 2025 pedersen generator";
const BP_DOMAIN: &str = "obscura 2025 bulletproof generator";

/// The five Pedersen bases.
pub struct PedersenGenerators {
    bases: [Point; 5],
}

pub static PEDERSEN: LazyLock<PedersenGenerators> = LazyLock::new(PedersenGenerators::derive);

impl PedersenGenerators {
    fn derive() -> Self {
        let g = EdwardsAffine::generator().into_group();
        let derived = |i: u8| hash_to_point(GENERATOR_DOMAIN, &[i]);
        Self {
            bases: [g, derived(1), derived(2), derived(3), derived(4)],
        }
    }

    pub fn base(&self, index: usize) -> Point {
        self.bases[index]
    }

    pub fn g_pk(&self) -> Point {
        self.bases[PEDERSEN_PK]
    }

    pub fn g_value(&self) -> Point {
        self.bases[PEDERSEN_VALUE]
    }

    pub fn g_snd(&self) -> Point {
        self.bases[PEDERSEN_SND]
    }

    pub fn g_shard(&self) -> Point {
        self.bases[PEDERSEN_SHARD]
    }

    pub fn g_rand(&self) -> Point {
        self.bases[PEDERSEN_RAND]
    }

    /// `value·G[index] + randomness·G_RAND`
    pub fn commit_at(&self, value: &Scalar, randomness: &Scalar, index: usize) -> Point {
        self.bases[index] * value + self.bases[PEDERSEN_RAND] * randomness
    }
}

/// Vector bases for the aggregated range proof.
pub struct BulletproofGenerators {
    pub g: Vec<EdwardsAffine>,
    pub h: Vec<EdwardsAffine>,
    /// Base for the inner-product term
    pub u: Point,
}

pub static BULLETPROOF: LazyLock<BulletproofGenerators> =
    LazyLock::new(BulletproofGenerators::derive);

impl BulletproofGenerators {
    fn derive() -> Self {
        let capacity = RANGE_BITS * MAX_AGGREGATED_OUTPUTS;
        let vector = |label: u8| -> Vec<EdwardsAffine> {
            let points: Vec<EdwardsProjective> = (0..capacity as u32)
                .map(|i| {
                    let mut seed = [0u8; 5];
                    seed[0] = label;
                    seed[1..].copy_from_slice(&i.to_le_bytes());
                    hash_to_point(BP_DOMAIN, &seed)
                })
                .collect();
            EdwardsProjective::normalize_batch(&points)
        };
        Self {
            g: vector(b'G'),
            h: vector(b'H'),
            u: hash_to_point(BP_DOMAIN, b"U"),
        }
    }
}
