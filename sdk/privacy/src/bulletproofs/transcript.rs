//! Fiat–Shamir transcript on a running blake3 state.

use crate::operation::{Point, Scalar, point_to_bytes, scalar_to_bytes};

#[derive(Clone)]
pub struct Transcript {
    hasher: blake3::Hasher,
}

impl Transcript {
    pub fn new(domain: &str) -> Self {
        Self {
            hasher: blake3::Hasher::new_derive_key(domain),
        }
    }

    fn append(&mut self, label: &[u8], bytes: &[u8]) {
        self.hasher.update(&(label.len() as u64).to_le_bytes());
        self.hasher.update(label);
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn append_u64(&mut self, label: &[u8], value: u64) {
        self.append(label, &value.to_le_bytes());
    }

    pub fn append_point(&mut self, label: &[u8], point: &Point) {
        self.append(label, &point_to_bytes(point));
    }

    pub fn append_scalar(&mut self, label: &[u8], scalar: &Scalar) {
        self.append(label, &scalar_to_bytes(scalar));
    }

    /// Squeeze a challenge and absorb it back.
    pub fn challenge(&mut self, label: &[u8]) -> Scalar {
        self.append(label, &[]);
        let mut wide = [0u8; 64];
        self.hasher.clone().finalize_xof().fill(&mut wide);
        let challenge = <Scalar as ark_ff::PrimeField>::from_le_bytes_mod_order(&wide);
        self.append_scalar(b"challenge", &challenge);
        challenge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::PEDERSEN;

    #[test]
    fn test_challenges_depend_on_history() {
        let mut a = Transcript::new("obscura test transcript");
        let mut b = Transcript::new("obscura test transcript");
        a.append_point(b"P", &PEDERSEN.g_pk());
        b.append_point(b"P", &PEDERSEN.g_rand());
        assert_ne!(a.challenge(b"x"), b.challenge(b"x"));
    }

    #[test]
    fn test_successive_challenges_differ() {
        let mut t = Transcript::new("obscura test transcript");
        let x = t.challenge(b"x");
        let y = t.challenge(b"x");
        assert_ne!(x, y);
    }
}
