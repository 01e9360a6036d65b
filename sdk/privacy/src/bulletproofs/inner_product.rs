//! Inner-product argument
//!
//! Proves knowledge of `a, b` with `P = <a,G> + <b,H> + <a,b>·Q` in
//! `log2(n)` rounds. Each round halves the vectors:
//!
//! ```text
//! L = <a_lo,G_hi> + <b_hi,H_lo> + <a_lo,b_hi>·Q
//! R = <a_hi,G_lo> + <b_lo,H_hi> + <a_hi,b_lo>·Q
//! v = H(L, R)
//! a' = v·a_lo + v⁻¹·a_hi    b' = v⁻¹·b_lo + v·b_hi
//! G' = v⁻¹·G_lo + v·G_hi    H' = v·H_lo + v⁻¹·H_hi
//! ```

use crate::bulletproofs::transcript::Transcript;
use crate::errors::{PrivacyError, Result};
use crate::operation::{Point, Scalar, inner_product, multi_scalar_mul, scalar_inverse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerProductProof {
    pub l: Vec<Point>,
    pub r: Vec<Point>,
    pub a: Scalar,
    pub b: Scalar,
}

/// Round challenges recovered by the verifier
pub struct Challenges {
    pub v: Vec<Scalar>,
    pub v_inv: Vec<Scalar>,
    /// `s_i` for every generator index
    pub s: Vec<Scalar>,
}

impl InnerProductProof {
    pub fn prove(
        transcript: &mut Transcript,
        q: &Point,
        mut g: Vec<Point>,
        mut h: Vec<Point>,
        mut a: Vec<Scalar>,
        mut b: Vec<Scalar>,
    ) -> Result<Self> {
        let mut n = a.len();
        if !n.is_power_of_two() || b.len() != n || g.len() != n || h.len() != n {
            return Err(PrivacyError::MalformedProof(
                "inner-product vectors must share a power-of-two length".into(),
            ));
        }

        let mut l_vec = Vec::new();
        let mut r_vec = Vec::new();
        while n > 1 {
            let half = n / 2;
            let (a_lo, a_hi) = a.split_at(half);
            let (b_lo, b_hi) = b.split_at(half);
            let (g_lo, g_hi) = g.split_at(half);
            let (h_lo, h_hi) = h.split_at(half);

            let c_l = inner_product(a_lo, b_hi);
            let c_r = inner_product(a_hi, b_lo);

            let l_point = multi_scalar_mul(
                &[g_hi, h_lo, std::slice::from_ref(q)].concat(),
                &[a_lo, b_hi, &[c_l][..]].concat(),
            );
            let r_point = multi_scalar_mul(
                &[g_lo, h_hi, std::slice::from_ref(q)].concat(),
                &[a_hi, b_lo, &[c_r][..]].concat(),
            );

            transcript.append_point(b"L", &l_point);
            transcript.append_point(b"R", &r_point);
            let v = transcript.challenge(b"v");
            let v_inv = scalar_inverse(&v)?;

            let next_a: Vec<Scalar> = (0..half).map(|i| a_lo[i] * v + a_hi[i] * v_inv).collect();
            let next_b: Vec<Scalar> = (0..half).map(|i| b_lo[i] * v_inv + b_hi[i] * v).collect();
            let next_g: Vec<Point> = (0..half).map(|i| g_lo[i] * v_inv + g_hi[i] * v).collect();
            let next_h: Vec<Point> = (0..half).map(|i| h_lo[i] * v + h_hi[i] * v_inv).collect();

            a = next_a;
            b = next_b;
            g = next_g;
            h = next_h;
            l_vec.push(l_point);
            r_vec.push(r_point);
            n = half;
        }

        Ok(Self {
            l: l_vec,
            r: r_vec,
            a: a[0],
            b: b[0],
        })
    }

    /// Replay the rounds on `transcript` and derive every `s_i`.
    pub fn challenges(&self, transcript: &mut Transcript, n: usize) -> Result<Challenges> {
        let rounds = self.l.len();
        if self.r.len() != rounds || n != 1usize << rounds {
            return Err(PrivacyError::MalformedProof(format!(
                "inner-product proof has {} rounds for {} generators",
                rounds, n
            )));
        }

        let mut v = Vec::with_capacity(rounds);
        let mut v_inv = Vec::with_capacity(rounds);
        for (l_point, r_point) in self.l.iter().zip(&self.r) {
            transcript.append_point(b"L", l_point);
            transcript.append_point(b"R", r_point);
            let challenge = transcript.challenge(b"v");
            v_inv.push(scalar_inverse(&challenge)?);
            v.push(challenge);
        }

        // Round k splits on bit (rounds-1-k) of the generator index.
        let s = (0..n)
            .map(|i| {
                (0..rounds).fold(Scalar::from(1u64), |acc, k| {
                    if (i >> (rounds - 1 - k)) & 1 == 1 {
                        acc * v[k]
                    } else {
                        acc * v_inv[k]
                    }
                })
            })
            .collect();

        Ok(Challenges { v, v_inv, s })
    }
}
