//! Multi-scalar accumulator.
//!
//! Range-proof verification reduces to "this linear combination of points
//! is the identity". [`MultiScalar`] collects the coefficients for the static
//! generators plus any per-proof points so that many such equations can be
//! randomly weighted, summed and checked with one multi-exponentiation.

use ark_ec::{CurveGroup, VariableBaseMSM};
use ark_ed_on_bls12_381::EdwardsAffine;
use ark_std::Zero;

use crate::generators::{BULLETPROOF, PEDERSEN};
use crate::operation::{Point, Scalar};

#[derive(Debug, Clone, Default)]
pub struct MultiScalar {
    g: Vec<Scalar>,
    h: Vec<Scalar>,
    u: Scalar,
    g_rand: Scalar,
    dynamic: Vec<(Scalar, Point)>,
}

impl MultiScalar {
    pub fn new() -> Self {
        Self::default()
    }

    fn grow(&mut self, len: usize) {
        if self.g.len() < len {
            self.g.resize(len, Scalar::zero());
            self.h.resize(len, Scalar::zero());
        }
    }

    pub fn add_g(&mut self, index: usize, scalar: Scalar) {
        self.grow(index + 1);
        self.g[index] += scalar;
    }

    pub fn add_h(&mut self, index: usize, scalar: Scalar) {
        self.grow(index + 1);
        self.h[index] += scalar;
    }

    pub fn add_u(&mut self, scalar: Scalar) {
        self.u += scalar;
    }

    pub fn add_g_rand(&mut self, scalar: Scalar) {
        self.g_rand += scalar;
    }

    pub fn push(&mut self, scalar: Scalar, point: Point) {
        self.dynamic.push((scalar, point));
    }

    /// Fold `weight · other` into `self`.
    pub fn concat_scaled(&mut self, other: MultiScalar, weight: &Scalar) {
        self.grow(other.g.len());
        for (i, s) in other.g.into_iter().enumerate() {
            self.g[i] += s * weight;
        }
        for (i, s) in other.h.into_iter().enumerate() {
            self.h[i] += s * weight;
        }
        self.u += other.u * weight;
        self.g_rand += other.g_rand * weight;
        self.dynamic
            .extend(other.dynamic.into_iter().map(|(s, p)| (s * weight, p)));
    }

    /// Evaluate the whole combination with one MSM.
    pub fn evaluate(&self) -> Point {
        let len = self.g.len().min(BULLETPROOF.g.len());
        let dynamic_points: Vec<Point> = self.dynamic.iter().map(|(_, p)| *p).collect();

        let mut bases: Vec<EdwardsAffine> = Vec::with_capacity(2 * len + 2 + dynamic_points.len());
        bases.extend_from_slice(&BULLETPROOF.g[..len]);
        bases.extend_from_slice(&BULLETPROOF.h[..len]);
        bases.push(BULLETPROOF.u.into_affine());
        bases.push(PEDERSEN.g_rand().into_affine());
        bases.extend(Point::normalize_batch(&dynamic_points));

        let mut scalars: Vec<Scalar> = Vec::with_capacity(bases.len());
        scalars.extend_from_slice(&self.g[..len]);
        scalars.extend_from_slice(&self.h[..len]);
        scalars.push(self.u);
        scalars.push(self.g_rand);
        scalars.extend(self.dynamic.iter().map(|(s, _)| *s));

        Point::msm_unchecked(&bases, &scalars)
    }

    pub fn is_identity(&self) -> bool {
        self.evaluate().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::random_scalar;

    #[test]
    fn test_evaluate_matches_manual_sum() {
        let a = random_scalar();
        let b = random_scalar();
        let p = PEDERSEN.g_value() * random_scalar();

        let mut ms = MultiScalar::new();
        ms.add_g(3, a);
        ms.add_g_rand(b);
        ms.push(Scalar::from(2u64), p);

        let expected = BULLETPROOF.g[3] * a + PEDERSEN.g_rand() * b + p * Scalar::from(2u64);
        assert_eq!(ms.evaluate(), expected);
    }

    #[test]
    fn test_concat_scaled_cancels() {
        let p = PEDERSEN.g_value() * random_scalar();
        let mut left = MultiScalar::new();
        left.push(Scalar::from(1u64), p);
        left.add_h(7, Scalar::from(3u64));

        let mut right = MultiScalar::new();
        right.push(Scalar::from(1u64), p);
        right.add_h(7, Scalar::from(3u64));

        left.concat_scaled(right, &-Scalar::from(1u64));
        assert!(left.is_identity());
    }
}
