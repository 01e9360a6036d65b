//! Aggregated range proofs (Bulletproofs)
//!
//! Proves every `V_j = v_j·g + γ_j·Gr` commits to `v_j ∈ [0, 2^64)`.
//! Commitments are not stored in the proof; the verifier supplies them from
//! the output coins, along with the value base `g` (`Gv`, or the first
//! output's asset tag for confidential assets).
//!
//! ```text
//! ┌──────────── prover ────────────┐        ┌──────────── verifier ────────────┐
//! │ A, S        ─► y, z            │        │ recompute y, z, x, w, v_k        │
//! │ T1, T2      ─► x               │  ───►  │ one MSM:                         │
//! │ τx, μ, t̂    ─► w               │        │   c·(poly check) + (IPA check)   │
//! │ inner-product(l, r)            │        │   == identity                    │
//! └────────────────────────────────┘        └──────────────────────────────────┘
//! ```

pub mod batch;
pub mod inner_product;
pub mod transcript;

use ark_ec::AffineRepr;
use ark_ff::{One, Zero};

use crate::errors::{PrivacyError, Result};
use crate::generators::{BULLETPROOF, MAX_AGGREGATED_OUTPUTS, PEDERSEN, RANGE_BITS};
use crate::multiexp::MultiScalar;
use crate::operation::{
    Point, Scalar, inner_product, multi_scalar_mul, powers, random_scalar, scalar_inverse,
};

pub use batch::{RangeStatement, batch_verify, find_invalid};
pub use inner_product::InnerProductProof;
use transcript::Transcript;

const RANGE_DOMAIN: &str = "obscura 2025 aggregated range proof";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRangeProof {
    pub a: Point,
    pub s: Point,
    pub t1: Point,
    pub t2: Point,
    pub tau_x: Scalar,
    pub mu: Scalar,
    pub t_hat: Scalar,
    pub ipa: InnerProductProof,
}

/// Number of aggregated slots for `count` values
fn padded_len(count: usize) -> Result<usize> {
    if count == 0 || count > MAX_AGGREGATED_OUTPUTS {
        return Err(PrivacyError::RangeProofSize {
            max: MAX_AGGREGATED_OUTPUTS,
            got: count,
        });
    }
    Ok(count.next_power_of_two())
}

fn start_transcript(value_base: &Point, commitments: &[Point], m: usize) -> Transcript {
    let mut transcript = Transcript::new(RANGE_DOMAIN);
    transcript.append_u64(b"n", RANGE_BITS as u64);
    transcript.append_u64(b"m", m as u64);
    transcript.append_point(b"g", value_base);
    for v in commitments {
        transcript.append_point(b"V", v);
    }
    for _ in commitments.len()..m {
        transcript.append_point(b"V", &Point::zero());
    }
    transcript
}

/// `Σ_j z^{2+j}·2^{i mod n}` laid out over all `n·m` positions
fn z_two_powers(z: &Scalar, m: usize) -> Vec<Scalar> {
    let two_pows = powers(&Scalar::from(2u64), RANGE_BITS);
    let z_pows = powers(z, m + 2);
    (0..RANGE_BITS * m)
        .map(|i| z_pows[2 + i / RANGE_BITS] * two_pows[i % RANGE_BITS])
        .collect()
}

impl AggregatedRangeProof {
    /// Prove `values[j]` is committed by `values[j]·value_base + randomness[j]·Gr`.
    pub fn prove(values: &[u64], randomness: &[Scalar], value_base: &Point) -> Result<Self> {
        if values.len() != randomness.len() {
            return Err(PrivacyError::MalformedProof(
                "values and randomness differ in length".into(),
            ));
        }
        let m = padded_len(values.len())?;
        let nm = RANGE_BITS * m;
        let h = PEDERSEN.g_rand();

        let mut gammas = randomness.to_vec();
        gammas.resize(m, Scalar::zero());
        let commitments: Vec<Point> = values
            .iter()
            .zip(randomness)
            .map(|(v, r)| *value_base * Scalar::from(*v) + h * r)
            .collect();

        let mut padded_values = values.to_vec();
        padded_values.resize(m, 0);
        let a_l: Vec<Scalar> = (0..nm)
            .map(|i| {
                let bit = (padded_values[i / RANGE_BITS] >> (i % RANGE_BITS)) & 1;
                Scalar::from(bit)
            })
            .collect();
        let a_r: Vec<Scalar> = a_l.iter().map(|b| *b - Scalar::one()).collect();

        let g_vec: Vec<Point> = BULLETPROOF.g[..nm].iter().map(|p| p.into_group()).collect();
        let h_vec: Vec<Point> = BULLETPROOF.h[..nm].iter().map(|p| p.into_group()).collect();

        let alpha = random_scalar();
        let a_point = multi_scalar_mul(&g_vec, &a_l) + multi_scalar_mul(&h_vec, &a_r) + h * alpha;

        let s_l: Vec<Scalar> = (0..nm).map(|_| random_scalar()).collect();
        let s_r: Vec<Scalar> = (0..nm).map(|_| random_scalar()).collect();
        let rho = random_scalar();
        let s_point = multi_scalar_mul(&g_vec, &s_l) + multi_scalar_mul(&h_vec, &s_r) + h * rho;

        let mut transcript = start_transcript(value_base, &commitments, m);
        transcript.append_point(b"A", &a_point);
        transcript.append_point(b"S", &s_point);
        let y = transcript.challenge(b"y");
        let z = transcript.challenge(b"z");

        let y_pows = powers(&y, nm);
        let z2n = z_two_powers(&z, m);

        // l(X) = l0 + l1·X,  r(X) = r0 + r1·X
        let l0: Vec<Scalar> = a_l.iter().map(|a| *a - z).collect();
        let l1 = s_l;
        let r0: Vec<Scalar> = (0..nm)
            .map(|i| y_pows[i] * (a_r[i] + z) + z2n[i])
            .collect();
        let r1: Vec<Scalar> = (0..nm).map(|i| y_pows[i] * s_r[i]).collect();

        let t1 = inner_product(&l0, &r1) + inner_product(&l1, &r0);
        let t2 = inner_product(&l1, &r1);

        let tau1 = random_scalar();
        let tau2 = random_scalar();
        let t1_point = *value_base * t1 + h * tau1;
        let t2_point = *value_base * t2 + h * tau2;

        transcript.append_point(b"T1", &t1_point);
        transcript.append_point(b"T2", &t2_point);
        let x = transcript.challenge(b"x");

        let z_pows = powers(&z, m + 2);
        let tau_x = tau1 * x
            + tau2 * x * x
            + (0..m).fold(Scalar::zero(), |acc, j| acc + z_pows[2 + j] * gammas[j]);
        let mu = alpha + rho * x;

        let l: Vec<Scalar> = (0..nm).map(|i| l0[i] + l1[i] * x).collect();
        let r: Vec<Scalar> = (0..nm).map(|i| r0[i] + r1[i] * x).collect();
        let t_hat = inner_product(&l, &r);

        transcript.append_scalar(b"tau_x", &tau_x);
        transcript.append_scalar(b"mu", &mu);
        transcript.append_scalar(b"t_hat", &t_hat);
        let w = transcript.challenge(b"w");
        let q = BULLETPROOF.u * w;

        let y_inv = scalar_inverse(&y)?;
        let y_inv_pows = powers(&y_inv, nm);
        let h_prime: Vec<Point> = (0..nm).map(|i| h_vec[i] * y_inv_pows[i]).collect();

        let ipa = InnerProductProof::prove(&mut transcript, &q, g_vec, h_prime, l, r)?;

        Ok(Self {
            a: a_point,
            s: s_point,
            t1: t1_point,
            t2: t2_point,
            tau_x,
            mu,
            t_hat,
            ipa,
        })
    }

    /// Build the identity-check combination for this proof.
    ///
    /// `weight` separates the polynomial check from the inner-product check;
    /// it must be unpredictable to the prover.
    pub fn verification_scalars(
        &self,
        commitments: &[Point],
        value_base: &Point,
        weight: &Scalar,
    ) -> Result<MultiScalar> {
        let m = padded_len(commitments.len())?;
        let nm = RANGE_BITS * m;

        let mut transcript = start_transcript(value_base, commitments, m);
        transcript.append_point(b"A", &self.a);
        transcript.append_point(b"S", &self.s);
        let y = transcript.challenge(b"y");
        let z = transcript.challenge(b"z");
        transcript.append_point(b"T1", &self.t1);
        transcript.append_point(b"T2", &self.t2);
        let x = transcript.challenge(b"x");
        transcript.append_scalar(b"tau_x", &self.tau_x);
        transcript.append_scalar(b"mu", &self.mu);
        transcript.append_scalar(b"t_hat", &self.t_hat);
        let w = transcript.challenge(b"w");

        let challenges = self.ipa.challenges(&mut transcript, nm)?;

        let y_pows = powers(&y, nm);
        let y_inv = scalar_inverse(&y)?;
        let y_inv_pows = powers(&y_inv, nm);
        let z_pows = powers(&z, m + 3);
        let z2n = z_two_powers(&z, m);
        let c = *weight;

        // δ(y,z) = (z − z²)·<1,y^nm> − Σ_j z^{3+j}·<1,2^n>
        let sum_y: Scalar = y_pows.iter().sum();
        let sum_two = Scalar::from(u64::MAX);
        let delta = (z - z * z) * sum_y
            - (0..m).fold(Scalar::zero(), |acc, j| acc + z_pows[3 + j]) * sum_two;

        let mut ms = MultiScalar::new();

        // c·[(t̂ − δ)·g + τx·h − Σ z^{2+j}·V_j − x·T1 − x²·T2]
        ms.push(c * (self.t_hat - delta), *value_base);
        for (j, v) in commitments.iter().enumerate() {
            ms.push(-c * z_pows[2 + j], *v);
        }
        ms.push(-c * x, self.t1);
        ms.push(-c * x * x, self.t2);

        // A + x·S − μ·h + Σ(−z − a·s_i)·G_i + Σ(z + (z2n_i − b·s_i⁻¹)·y⁻ⁱ)·H_i
        //   + (t̂ − a·b)·w·u + Σ(v_k²·L_k + v_k⁻²·R_k)
        ms.add_g_rand(c * self.tau_x - self.mu);
        ms.push(Scalar::one(), self.a);
        ms.push(x, self.s);

        let a = self.ipa.a;
        let b = self.ipa.b;
        for i in 0..nm {
            let s_i = challenges.s[i];
            let s_inv_i = scalar_inverse(&s_i)?;
            ms.add_g(i, -z - a * s_i);
            ms.add_h(i, z + (z2n[i] - b * s_inv_i) * y_inv_pows[i]);
        }
        ms.add_u((self.t_hat - a * b) * w);
        for k in 0..self.ipa.l.len() {
            let v = challenges.v[k];
            let v_inv = challenges.v_inv[k];
            ms.push(v * v, self.ipa.l[k]);
            ms.push(v_inv * v_inv, self.ipa.r[k]);
        }

        Ok(ms)
    }

    pub fn verify(&self, commitments: &[Point], value_base: &Point) -> Result<()> {
        let ms = self.verification_scalars(commitments, value_base, &random_scalar())?;
        if ms.is_identity() {
            Ok(())
        } else {
            Err(PrivacyError::VerificationFailed("range proof"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_all(values: &[u64], randomness: &[Scalar], base: &Point) -> Vec<Point> {
        values
            .iter()
            .zip(randomness)
            .map(|(v, r)| *base * Scalar::from(*v) + PEDERSEN.g_rand() * r)
            .collect()
    }

    #[test]
    fn test_single_value() {
        let base = PEDERSEN.g_value();
        let values = [42u64];
        let rs = [random_scalar()];
        let proof = AggregatedRangeProof::prove(&values, &rs, &base).unwrap();
        assert!(proof.verify(&commit_all(&values, &rs, &base), &base).is_ok());
    }

    #[test]
    fn test_aggregated_non_power_of_two() {
        let base = PEDERSEN.g_value();
        let values = [0u64, u64::MAX, 1_000_000];
        let rs: Vec<Scalar> = (0..3).map(|_| random_scalar()).collect();
        let proof = AggregatedRangeProof::prove(&values, &rs, &base).unwrap();
        assert_eq!(proof.ipa.l.len(), 8); // 64 * 4 = 2^8
        assert!(proof.verify(&commit_all(&values, &rs, &base), &base).is_ok());
    }

    #[test]
    fn test_wrong_commitment_rejected() {
        let base = PEDERSEN.g_value();
        let values = [5u64, 6];
        let rs: Vec<Scalar> = (0..2).map(|_| random_scalar()).collect();
        let proof = AggregatedRangeProof::prove(&values, &rs, &base).unwrap();
        let mut commitments = commit_all(&values, &rs, &base);
        commitments[1] += base;
        assert!(proof.verify(&commitments, &base).is_err());
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        // -1 committed as a scalar is far outside [0, 2^64)
        let base = PEDERSEN.g_value();
        let rs = [random_scalar()];
        let proof = AggregatedRangeProof::prove(&[7], &rs, &base).unwrap();
        let negative = base * (-Scalar::one()) + PEDERSEN.g_rand() * rs[0];
        assert!(proof.verify(&[negative], &base).is_err());
    }

    #[test]
    fn test_custom_value_base() {
        let base = PEDERSEN.g_snd();
        let values = [9u64, 10];
        let rs: Vec<Scalar> = (0..2).map(|_| random_scalar()).collect();
        let proof = AggregatedRangeProof::prove(&values, &rs, &base).unwrap();
        let commitments = commit_all(&values, &rs, &base);
        assert!(proof.verify(&commitments, &base).is_ok());
        assert!(proof.verify(&commitments, &PEDERSEN.g_value()).is_err());
    }

    #[test]
    fn test_size_limits() {
        let base = PEDERSEN.g_value();
        assert!(matches!(
            AggregatedRangeProof::prove(&[], &[], &base),
            Err(PrivacyError::RangeProofSize { .. })
        ));
        let values = vec![1u64; MAX_AGGREGATED_OUTPUTS + 1];
        let rs = vec![Scalar::one(); MAX_AGGREGATED_OUTPUTS + 1];
        assert!(AggregatedRangeProof::prove(&values, &rs, &base).is_err());
    }

    #[test]
    fn test_commitment_count_mismatch_rejected() {
        let base = PEDERSEN.g_value();
        let values = [1u64, 2];
        let rs: Vec<Scalar> = (0..2).map(|_| random_scalar()).collect();
        let proof = AggregatedRangeProof::prove(&values, &rs, &base).unwrap();
        let commitments = commit_all(&values, &rs, &base);
        // four commitments need 8 rounds, the proof has 7
        let mut more = commitments.clone();
        more.push(commitments[0]);
        more.push(commitments[1]);
        assert!(matches!(
            proof.verify(&more, &base),
            Err(PrivacyError::MalformedProof(_))
        ));
    }
}
