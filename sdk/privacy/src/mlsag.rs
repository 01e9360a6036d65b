//! MLSAG ring signatures
//!
//! A ring is `rows × cols` public keys. The signer owns one full row `pi`.
//! The first `cols - k` columns are linkable spend keys with key images
//! `I_j = x_j·Hp(P_j)`; the last `k` columns are balance keys over `Gr`
//! that carry no key image.
//!
//! ```text
//! linkable j:  L_ij = r_ij·G  + c_i·P_ij     R_ij = r_ij·Hp(P_ij) + c_i·I_j
//! balance  j:  L_ij = r_ij·Gr + c_i·P_ij
//! c_{i+1} = H(m, L_i*, R_i*)          closes when c_rows == c_0
//! ```
//!
//! Key images are not part of [`MlsagSignature`]; the verifier takes them
//! from the spent coins.

use rand::Rng;
use rand::rngs::OsRng;

use crate::coin::key_image_base;
use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::operation::{Point, Scalar, hash_to_scalar, point_to_bytes, random_scalar};

const MLSAG_DOMAIN: &str = "obscura 2025 mlsag";

/// Public keys of every ring member, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    keys: Vec<Vec<Point>>,
}

impl Ring {
    pub fn new(keys: Vec<Vec<Point>>) -> Result<Self> {
        let cols = keys.first().map(Vec::len).unwrap_or(0);
        if keys.is_empty() || cols == 0 {
            return Err(PrivacyError::MalformedRing("empty ring".into()));
        }
        if keys.iter().any(|row| row.len() != cols) {
            return Err(PrivacyError::MalformedRing("ragged ring rows".into()));
        }
        Ok(Self { keys })
    }

    pub fn rows(&self) -> usize {
        self.keys.len()
    }

    pub fn cols(&self) -> usize {
        self.keys[0].len()
    }

    pub fn row(&self, i: usize) -> &[Point] {
        &self.keys[i]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MlsagSignature {
    pub c0: Scalar,
    /// `rows × cols` responses
    pub r: Vec<Vec<Scalar>>,
}

/// Signer state: the ring, the secret row and its private keys.
pub struct Mlsag {
    ring: Ring,
    pi: usize,
    private_keys: Vec<Scalar>,
    linkable: usize,
}

fn column_base(j: usize, linkable: usize) -> Point {
    if j < linkable {
        PEDERSEN.g_pk()
    } else {
        PEDERSEN.g_rand()
    }
}

fn round_challenge(message: &[u8; 32], l: &[Point], r: &[Point]) -> Scalar {
    let encoded: Vec<[u8; 32]> = l.iter().chain(r).map(point_to_bytes).collect();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(encoded.len() + 1);
    parts.push(message);
    parts.extend(encoded.iter().map(|b| b.as_slice()));
    hash_to_scalar(MLSAG_DOMAIN, &parts)
}

/// `L` and `R` for row `i` given responses and the incoming challenge.
fn row_points(
    row: &[Point],
    responses: &[Scalar],
    c: &Scalar,
    key_images: &[Point],
    linkable: usize,
) -> (Vec<Point>, Vec<Point>) {
    let mut l = Vec::with_capacity(row.len());
    let mut r = Vec::with_capacity(linkable);
    for (j, key) in row.iter().enumerate() {
        l.push(column_base(j, linkable) * responses[j] + *key * c);
        if j < linkable {
            r.push(key_image_base(key) * responses[j] + key_images[j] * c);
        }
    }
    (l, r)
}

impl Mlsag {
    /// `linkable` is the number of leading spend columns; the rest are balance columns.
    pub fn new(ring: Ring, pi: usize, private_keys: Vec<Scalar>, linkable: usize) -> Result<Self> {
        if pi >= ring.rows() {
            return Err(PrivacyError::MalformedRing(format!("pi {} out of ring", pi)));
        }
        if private_keys.len() != ring.cols() || linkable > ring.cols() {
            return Err(PrivacyError::MalformedRing(format!(
                "{} private keys for {} columns",
                private_keys.len(),
                ring.cols()
            )));
        }
        for (j, (key, x)) in ring.row(pi).iter().zip(&private_keys).enumerate() {
            if column_base(j, linkable) * x != *key {
                return Err(PrivacyError::MalformedRing(format!(
                    "private key {} does not open row {}",
                    j, pi
                )));
            }
        }
        Ok(Self {
            ring,
            pi,
            private_keys,
            linkable,
        })
    }

    /// Draw `pi` uniformly from the OS CSPRNG.
    pub fn random_position(rows: usize) -> usize {
        OsRng.gen_range(0..rows)
    }

    pub fn key_images(&self) -> Vec<Point> {
        self.ring.row(self.pi)[..self.linkable]
            .iter()
            .zip(&self.private_keys)
            .map(|(key, x)| key_image_base(key) * x)
            .collect()
    }

    /// Sign; returns the signature and the key images it was made with.
    pub fn sign(&self, message: &[u8; 32]) -> (MlsagSignature, Vec<Point>) {
        let rows = self.ring.rows();
        let cols = self.ring.cols();
        let key_images = self.key_images();

        let alpha: Vec<Scalar> = (0..cols).map(|_| random_scalar()).collect();
        let own = self.ring.row(self.pi);
        let l: Vec<Point> = (0..cols)
            .map(|j| column_base(j, self.linkable) * alpha[j])
            .collect();
        let r: Vec<Point> = (0..self.linkable)
            .map(|j| key_image_base(&own[j]) * alpha[j])
            .collect();

        let mut c = vec![Scalar::from(0u64); rows];
        let mut responses: Vec<Vec<Scalar>> = vec![Vec::new(); rows];
        c[(self.pi + 1) % rows] = round_challenge(message, &l, &r);

        let mut i = (self.pi + 1) % rows;
        while i != self.pi {
            responses[i] = (0..cols).map(|_| random_scalar()).collect();
            let (l, r) = row_points(
                self.ring.row(i),
                &responses[i],
                &c[i],
                &key_images,
                self.linkable,
            );
            c[(i + 1) % rows] = round_challenge(message, &l, &r);
            i = (i + 1) % rows;
        }

        responses[self.pi] = (0..cols)
            .map(|j| alpha[j] - c[self.pi] * self.private_keys[j])
            .collect();

        (
            MlsagSignature {
                c0: c[0],
                r: responses,
            },
            key_images,
        )
    }
}

impl MlsagSignature {
    pub fn verify(
        &self,
        ring: &Ring,
        key_images: &[Point],
        linkable: usize,
        message: &[u8; 32],
    ) -> Result<()> {
        if self.r.len() != ring.rows() || self.r.iter().any(|row| row.len() != ring.cols()) {
            return Err(PrivacyError::MalformedProof(format!(
                "signature shape does not match {}x{} ring",
                ring.rows(),
                ring.cols()
            )));
        }
        if key_images.len() != linkable || linkable > ring.cols() {
            return Err(PrivacyError::MalformedProof(format!(
                "{} key images for {} linkable columns",
                key_images.len(),
                linkable
            )));
        }

        let mut c = self.c0;
        for i in 0..ring.rows() {
            let (l, r) = row_points(ring.row(i), &self.r[i], &c, key_images, linkable);
            c = round_challenge(message, &l, &r);
        }
        if c == self.c0 {
            Ok(())
        } else {
            Err(PrivacyError::VerificationFailed("MLSAG"))
        }
    }
}
