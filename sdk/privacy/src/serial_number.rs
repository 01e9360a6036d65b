//! Serial-number proofs
//!
//! Statement (private form):
//! ```text
//! com_sk  = sk·G  + r_sk·Gr
//! com_snd = snd·Gsnd + r_snd·Gr
//! SN      = (sk + snd)^-1 · G
//! ```
//! The verifier learns SN and both commitments, never `sk` or `snd`.
//!
//! Statement (no-privacy form, used by conversions): `PK = sk·G` and
//! `SN = (sk + snd)^-1 · G` with `PK` and `snd` public.

use crate::errors::{PrivacyError, Result};
use crate::generators::PEDERSEN;
use crate::operation::{Point, Scalar, hash_to_scalar, point_to_bytes, random_scalar, scalar_to_bytes};

const SN_DOMAIN: &str = "obscura 2025 serial number proof";
const SN_NO_PRIVACY_DOMAIN: &str = "obscura 2025 serial number proof no privacy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialNumberStatement {
    pub com_sk: Point,
    pub com_snd: Point,
    pub serial_number: Point,
}

pub struct SerialNumberWitness {
    pub sk: Scalar,
    pub r_sk: Scalar,
    pub snd: Scalar,
    pub r_snd: Scalar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumberProof {
    pub t_sk: Point,
    pub t_snd: Point,
    pub t_sn: Point,
    pub z_sk: Scalar,
    pub z_rsk: Scalar,
    pub z_snd: Scalar,
    pub z_rsnd: Scalar,
}

fn challenge(statement: &SerialNumberStatement, t_sk: &Point, t_snd: &Point, t_sn: &Point) -> Scalar {
    hash_to_scalar(
        SN_DOMAIN,
        &[
            &point_to_bytes(&statement.com_sk),
            &point_to_bytes(&statement.com_snd),
            &point_to_bytes(&statement.serial_number),
            &point_to_bytes(t_sk),
            &point_to_bytes(t_snd),
            &point_to_bytes(t_sn),
        ],
    )
}

impl SerialNumberProof {
    pub fn prove(statement: &SerialNumberStatement, witness: &SerialNumberWitness) -> Self {
        let (e_sk, d_sk, e_snd, d_snd) = (
            random_scalar(),
            random_scalar(),
            random_scalar(),
            random_scalar(),
        );
        let t_sk = PEDERSEN.g_pk() * e_sk + PEDERSEN.g_rand() * d_sk;
        let t_snd = PEDERSEN.g_snd() * e_snd + PEDERSEN.g_rand() * d_snd;
        let t_sn = statement.serial_number * (e_sk + e_snd);

        let x = challenge(statement, &t_sk, &t_snd, &t_sn);
        Self {
            t_sk,
            t_snd,
            t_sn,
            z_sk: e_sk + x * witness.sk,
            z_rsk: d_sk + x * witness.r_sk,
            z_snd: e_snd + x * witness.snd,
            z_rsnd: d_snd + x * witness.r_snd,
        }
    }

    pub fn verify(&self, statement: &SerialNumberStatement) -> Result<()> {
        let x = challenge(statement, &self.t_sk, &self.t_snd, &self.t_sn);

        let sk_ok = PEDERSEN.g_pk() * self.z_sk + PEDERSEN.g_rand() * self.z_rsk
            == self.t_sk + statement.com_sk * x;
        let snd_ok = PEDERSEN.g_snd() * self.z_snd + PEDERSEN.g_rand() * self.z_rsnd
            == self.t_snd + statement.com_snd * x;
        let sn_ok = statement.serial_number * (self.z_sk + self.z_snd)
            == self.t_sn + PEDERSEN.g_pk() * x;

        if sk_ok && snd_ok && sn_ok {
            Ok(())
        } else {
            Err(PrivacyError::VerificationFailed("serial number proof"))
        }
    }
}

/// Serial-number proof for a coin whose owner key and `snd` are public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumberNoPrivacyProof {
    pub t_pk: Point,
    pub t_sn: Point,
    pub z: Scalar,
}

fn no_privacy_challenge(
    public_key: &Point,
    snd: &Scalar,
    serial_number: &Point,
    t_pk: &Point,
    t_sn: &Point,
) -> Scalar {
    hash_to_scalar(
        SN_NO_PRIVACY_DOMAIN,
        &[
            &point_to_bytes(public_key),
            &scalar_to_bytes(snd),
            &point_to_bytes(serial_number),
            &point_to_bytes(t_pk),
            &point_to_bytes(t_sn),
        ],
    )
}

impl SerialNumberNoPrivacyProof {
    pub fn prove(public_key: &Point, snd: &Scalar, serial_number: &Point, sk: &Scalar) -> Self {
        let e = random_scalar();
        let t_pk = PEDERSEN.g_pk() * e;
        let t_sn = *serial_number * e;
        let x = no_privacy_challenge(public_key, snd, serial_number, &t_pk, &t_sn);
        Self {
            t_pk,
            t_sn,
            z: e + x * sk,
        }
    }

    pub fn verify(&self, public_key: &Point, snd: &Scalar, serial_number: &Point) -> Result<()> {
        let x = no_privacy_challenge(public_key, snd, serial_number, &self.t_pk, &self.t_sn);
        let pk_ok = PEDERSEN.g_pk() * self.z == self.t_pk + *public_key * x;
        // sk·SN = G - snd·SN
        let sn_ok = *serial_number * self.z
            == self.t_sn + (PEDERSEN.g_pk() - *serial_number * snd) * x;
        if pk_ok && sn_ok {
            Ok(())
        } else {
            Err(PrivacyError::VerificationFailed("serial number proof"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::scalar_inverse;

    fn setup() -> (SerialNumberStatement, SerialNumberWitness) {
        let witness = SerialNumberWitness {
            sk: random_scalar(),
            r_sk: random_scalar(),
            snd: random_scalar(),
            r_snd: random_scalar(),
        };
        let statement = SerialNumberStatement {
            com_sk: PEDERSEN.g_pk() * witness.sk + PEDERSEN.g_rand() * witness.r_sk,
            com_snd: PEDERSEN.g_snd() * witness.snd + PEDERSEN.g_rand() * witness.r_snd,
            serial_number: PEDERSEN.g_pk() * scalar_inverse(&(witness.sk + witness.snd)).unwrap(),
        };
        (statement, witness)
    }

    #[test]
    fn test_prove_verify() {
        let (statement, witness) = setup();
        let proof = SerialNumberProof::prove(&statement, &witness);
        assert!(proof.verify(&statement).is_ok());
    }

    #[test]
    fn test_wrong_serial_number_rejected() {
        let (mut statement, witness) = setup();
        let proof = SerialNumberProof::prove(&statement, &witness);
        statement.serial_number += PEDERSEN.g_pk();
        assert!(proof.verify(&statement).is_err());
    }

    #[test]
    fn test_forged_serial_number_cannot_be_proven() {
        let (mut statement, witness) = setup();
        statement.serial_number = PEDERSEN.g_pk() * random_scalar();
        let proof = SerialNumberProof::prove(&statement, &witness);
        assert!(proof.verify(&statement).is_err());
    }

    #[test]
    fn test_no_privacy_prove_verify() {
        let sk = random_scalar();
        let snd = random_scalar();
        let pk = PEDERSEN.g_pk() * sk;
        let sn = PEDERSEN.g_pk() * scalar_inverse(&(sk + snd)).unwrap();
        let proof = SerialNumberNoPrivacyProof::prove(&pk, &snd, &sn, &sk);
        assert!(proof.verify(&pk, &snd, &sn).is_ok());
        assert!(proof.verify(&pk, &random_scalar(), &sn).is_err());
    }
}
