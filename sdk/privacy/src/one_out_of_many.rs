//! One-out-of-many proofs (Groth–Kohlweiss)
//!
//! Proves that one of `N = 2^n` public points `D_0..D_{N-1}` is a commitment
//! to zero, `D_l = r·Gr`, without revealing `l`.
//!
//! ```text
//! for each bit j of l:
//!   cl_j = l_j·g + r_j·h          ca_j = a_j·g + s_j·h        cb_j = (l_j·a_j)·g + t_j·h
//! p_i(x) = Π_j f_{j,i_j}(x) = δ_{i,l}·x^n + Σ_k p_{i,k}·x^k
//!   cd_k = Σ_i p_{i,k}·D_i + ρ_k·h
//! x = H(D, cl, ca, cb, cd)
//!   f_j = l_j·x + a_j    za_j = r_j·x + s_j    zb_j = r_j·(x − f_j) + t_j
//!   zd  = r·x^n − Σ_k ρ_k·x^k
//! ```

use ark_ff::{One, Zero};

use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::operation::{
    Point, Scalar, hash_to_scalar, multi_scalar_mul, point_to_bytes, powers, random_scalar,
};

/// Ring members per input in a v1 proof
pub const RING_SIZE: usize = 8;
/// `log2(RING_SIZE)`
pub const RING_DEPTH: usize = 3;

const OOM_DOMAIN: &str = "obscura 2025 one out of many";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOutOfManyProof {
    pub cl: Vec<Point>,
    pub ca: Vec<Point>,
    pub cb: Vec<Point>,
    pub cd: Vec<Point>,
    pub f: Vec<Scalar>,
    pub za: Vec<Scalar>,
    pub zb: Vec<Scalar>,
    pub zd: Scalar,
}

fn bit(i: usize, j: usize) -> bool {
    (i >> j) & 1 == 1
}

/// Multiply a polynomial (coefficients low to high) by `c1·x + c0`.
fn mul_linear(poly: &[Scalar], c1: Scalar, c0: Scalar) -> Vec<Scalar> {
    let mut out = vec![Scalar::zero(); poly.len() + 1];
    for (k, coeff) in poly.iter().enumerate() {
        out[k] += *coeff * c0;
        out[k + 1] += *coeff * c1;
    }
    out
}

fn challenge(commitments: &[Point], cl: &[Point], ca: &[Point], cb: &[Point], cd: &[Point]) -> Scalar {
    let encoded: Vec<[u8; 32]> = commitments
        .iter()
        .chain(cl)
        .chain(ca)
        .chain(cb)
        .chain(cd)
        .map(point_to_bytes)
        .collect();
    let parts: Vec<&[u8]> = encoded.iter().map(|b| b.as_slice()).collect();
    hash_to_scalar(OOM_DOMAIN, &parts)
}

impl OneOutOfManyProof {
    pub fn prove(commitments: &[Point], index: usize, randomness: &Scalar) -> Result<Self> {
        if commitments.len() != RING_SIZE {
            return Err(PrivacyError::MalformedRing(format!(
                "expected {} commitments, got {}",
                RING_SIZE,
                commitments.len()
            )));
        }
        if index >= RING_SIZE {
            return Err(PrivacyError::MalformedRing(format!("index {} out of ring", index)));
        }
        let g = PEDERSEN.g_value();
        let h = PEDERSEN.g_rand();

        let l_bits: Vec<Scalar> = (0..RING_DEPTH)
            .map(|j| if bit(index, j) { Scalar::one() } else { Scalar::zero() })
            .collect();
        let r: Vec<Scalar> = (0..RING_DEPTH).map(|_| random_scalar()).collect();
        let a: Vec<Scalar> = (0..RING_DEPTH).map(|_| random_scalar()).collect();
        let s: Vec<Scalar> = (0..RING_DEPTH).map(|_| random_scalar()).collect();
        let t: Vec<Scalar> = (0..RING_DEPTH).map(|_| random_scalar()).collect();
        let rho: Vec<Scalar> = (0..RING_DEPTH).map(|_| random_scalar()).collect();

        let mut cl = Vec::with_capacity(RING_DEPTH);
        let mut ca = Vec::with_capacity(RING_DEPTH);
        let mut cb = Vec::with_capacity(RING_DEPTH);
        for j in 0..RING_DEPTH {
            cl.push(g * l_bits[j] + h * r[j]);
            ca.push(g * a[j] + h * s[j]);
            cb.push(g * (l_bits[j] * a[j]) + h * t[j]);
        }

        // p_i(x) coefficients, index k = power of x
        let polys: Vec<Vec<Scalar>> = (0..RING_SIZE)
            .map(|i| {
                let mut poly = vec![Scalar::one()];
                for j in 0..RING_DEPTH {
                    poly = if bit(i, j) {
                        mul_linear(&poly, l_bits[j], a[j])
                    } else {
                        mul_linear(&poly, Scalar::one() - l_bits[j], -a[j])
                    };
                }
                poly
            })
            .collect();

        let cd: Vec<Point> = (0..RING_DEPTH)
            .map(|k| {
                let scalars: Vec<Scalar> = polys.iter().map(|p| p[k]).collect();
                multi_scalar_mul(commitments, &scalars) + h * rho[k]
            })
            .collect();

        let x = challenge(commitments, &cl, &ca, &cb, &cd);
        let x_pow = powers(&x, RING_DEPTH + 1);

        let f: Vec<Scalar> = (0..RING_DEPTH).map(|j| l_bits[j] * x + a[j]).collect();
        let za: Vec<Scalar> = (0..RING_DEPTH).map(|j| r[j] * x + s[j]).collect();
        let zb: Vec<Scalar> = (0..RING_DEPTH)
            .map(|j| r[j] * (x - f[j]) + t[j])
            .collect();
        let zd = *randomness * x_pow[RING_DEPTH]
            - (0..RING_DEPTH).fold(Scalar::zero(), |acc, k| acc + rho[k] * x_pow[k]);

        Ok(Self {
            cl,
            ca,
            cb,
            cd,
            f,
            za,
            zb,
            zd,
        })
    }

    fn check_shape(&self) -> Result<()> {
        let ok = [self.cl.len(), self.ca.len(), self.cb.len(), self.cd.len()]
            .iter()
            .chain([self.f.len(), self.za.len(), self.zb.len()].iter())
            .all(|len| *len == RING_DEPTH);
        if ok {
            Ok(())
        } else {
            Err(PrivacyError::MalformedProof("one-out-of-many vector length".into()))
        }
    }

    pub fn verify(&self, commitments: &[Point]) -> Result<()> {
        self.check_shape()?;
        if commitments.len() != RING_SIZE {
            return Err(PrivacyError::MalformedRing(format!(
                "expected {} commitments, got {}",
                RING_SIZE,
                commitments.len()
            )));
        }
        let g = PEDERSEN.g_value();
        let h = PEDERSEN.g_rand();
        let x = challenge(commitments, &self.cl, &self.ca, &self.cb, &self.cd);

        for j in 0..RING_DEPTH {
            if self.cl[j] * x + self.ca[j] != g * self.f[j] + h * self.za[j] {
                return Err(PrivacyError::VerificationFailed("one-out-of-many"));
            }
            if self.cl[j] * (x - self.f[j]) + self.cb[j] != h * self.zb[j] {
                return Err(PrivacyError::VerificationFailed("one-out-of-many"));
            }
        }

        let x_pow = powers(&x, RING_DEPTH);
        let mut points: Vec<Point> = Vec::with_capacity(RING_SIZE + RING_DEPTH + 1);
        let mut scalars: Vec<Scalar> = Vec::with_capacity(RING_SIZE + RING_DEPTH + 1);
        for (i, commitment) in commitments.iter().enumerate() {
            let coeff = (0..RING_DEPTH).fold(Scalar::one(), |acc, j| {
                acc * if bit(i, j) { self.f[j] } else { x - self.f[j] }
            });
            points.push(*commitment);
            scalars.push(coeff);
        }
        for k in 0..RING_DEPTH {
            points.push(self.cd[k]);
            scalars.push(-x_pow[k]);
        }
        points.push(h);
        scalars.push(-self.zd);

        if multi_scalar_mul(&points, &scalars).is_zero() {
            Ok(())
        } else {
            Err(PrivacyError::VerificationFailed("one-out-of-many"))
        }
    }
}
