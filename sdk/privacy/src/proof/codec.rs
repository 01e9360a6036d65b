//! Binary wire forms of proofs.
//!
//! Curve elements travel as fixed 32-byte arrays and are validated on the
//! way back in; the structs here carry no invariants of their own.

use wincode::{SchemaRead, SchemaWrite};

use crate::bulletproofs::{AggregatedRangeProof, InnerProductProof};
use crate::coin::v1::SealedOpeningV1;
use crate::coin::{CoinV1, CoinV2, EncryptedPayload, TxRandom};
use crate::errors::{PrivacyError, Result};
use crate::mlsag::MlsagSignature;
use crate::one_out_of_many::OneOutOfManyProof;
use crate::operation::{Point, Scalar, point_from_bytes, point_to_bytes, scalar_from_bytes, scalar_to_bytes};
use crate::proof::conversion::ConversionProof;
use crate::proof::v1::ProofV1;
use crate::proof::v2::ProofV2;
use crate::schnorr::SchnorrSignature;
use crate::serial_number::{SerialNumberNoPrivacyProof, SerialNumberProof};

type Bytes32 = [u8; 32];

fn pt(p: &Point) -> Bytes32 {
    point_to_bytes(p)
}

fn sc(s: &Scalar) -> Bytes32 {
    scalar_to_bytes(s)
}

fn read_pt(b: &Bytes32) -> Result<Point> {
    point_from_bytes(b)
}

fn read_sc(b: &Bytes32) -> Result<Scalar> {
    scalar_from_bytes(b)
}

fn pts(v: &[Point]) -> Vec<Bytes32> {
    v.iter().map(pt).collect()
}

fn scs(v: &[Scalar]) -> Vec<Bytes32> {
    v.iter().map(sc).collect()
}

fn read_pts(v: &[Bytes32]) -> Result<Vec<Point>> {
    v.iter().map(read_pt).collect()
}

fn read_scs(v: &[Bytes32]) -> Result<Vec<Scalar>> {
    v.iter().map(read_sc).collect()
}

pub(crate) fn encode_error(e: impl std::fmt::Display) -> PrivacyError {
    PrivacyError::Encode(e.to_string())
}

pub(crate) fn decode_error(e: impl std::fmt::Display) -> PrivacyError {
    PrivacyError::Decode(e.to_string())
}

#[derive(SchemaRead, SchemaWrite)]
pub struct PayloadWire {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

impl From<&EncryptedPayload> for PayloadWire {
    fn from(p: &EncryptedPayload) -> Self {
        Self {
            nonce: p.nonce,
            ciphertext: p.ciphertext.clone(),
        }
    }
}

impl From<PayloadWire> for EncryptedPayload {
    fn from(w: PayloadWire) -> Self {
        Self {
            nonce: w.nonce,
            ciphertext: w.ciphertext,
        }
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct CoinV1Wire {
    pub public_key: Bytes32,
    pub commitment: Bytes32,
    pub snd: Bytes32,
    pub value: Option<u64>,
    pub randomness: Option<Bytes32>,
    pub info: Vec<u8>,
    pub ephemeral_key: Option<Bytes32>,
    pub payload: Option<PayloadWire>,
    pub serial_number: Option<Bytes32>,
}

impl From<&CoinV1> for CoinV1Wire {
    fn from(c: &CoinV1) -> Self {
        Self {
            public_key: pt(&c.public_key),
            commitment: pt(&c.commitment),
            snd: sc(&c.snd),
            value: c.value,
            randomness: c.randomness.as_ref().map(sc),
            info: c.info.clone(),
            ephemeral_key: c.sealed.as_ref().map(|s| pt(&s.ephemeral_key)),
            payload: c.sealed.as_ref().map(|s| PayloadWire::from(&s.payload)),
            serial_number: c.serial_number.as_ref().map(pt),
        }
    }
}

impl TryFrom<CoinV1Wire> for CoinV1 {
    type Error = PrivacyError;

    fn try_from(w: CoinV1Wire) -> Result<Self> {
        let sealed = match (w.ephemeral_key, w.payload) {
            (Some(key), Some(payload)) => Some(SealedOpeningV1 {
                ephemeral_key: read_pt(&key)?,
                payload: payload.into(),
            }),
            (None, None) => None,
            _ => return Err(PrivacyError::Decode("half-sealed v1 coin".into())),
        };
        Ok(Self {
            public_key: read_pt(&w.public_key)?,
            commitment: read_pt(&w.commitment)?,
            snd: read_sc(&w.snd)?,
            value: w.value,
            randomness: w.randomness.as_ref().map(read_sc).transpose()?,
            info: w.info,
            sealed,
            serial_number: w.serial_number.as_ref().map(read_pt).transpose()?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct CoinV2Wire {
    pub public_key: Bytes32,
    pub commitment: Bytes32,
    pub tx_random: Bytes32,
    pub tx_random_index: u32,
    pub asset_tag: Option<Bytes32>,
    pub value: Option<u64>,
    pub randomness: Option<Bytes32>,
    pub info: Vec<u8>,
    pub payload: Option<PayloadWire>,
    pub key_image: Option<Bytes32>,
}

impl From<&CoinV2> for CoinV2Wire {
    fn from(c: &CoinV2) -> Self {
        Self {
            public_key: pt(&c.public_key),
            commitment: pt(&c.commitment),
            tx_random: pt(&c.tx_random.point),
            tx_random_index: c.tx_random.index,
            asset_tag: c.asset_tag.as_ref().map(pt),
            value: c.value,
            randomness: c.randomness.as_ref().map(sc),
            info: c.info.clone(),
            payload: c.payload.as_ref().map(PayloadWire::from),
            key_image: c.key_image.as_ref().map(pt),
        }
    }
}

impl TryFrom<CoinV2Wire> for CoinV2 {
    type Error = PrivacyError;

    fn try_from(w: CoinV2Wire) -> Result<Self> {
        Ok(Self {
            public_key: read_pt(&w.public_key)?,
            commitment: read_pt(&w.commitment)?,
            tx_random: TxRandom {
                point: read_pt(&w.tx_random)?,
                index: w.tx_random_index,
            },
            asset_tag: w.asset_tag.as_ref().map(read_pt).transpose()?,
            value: w.value,
            randomness: w.randomness.as_ref().map(read_sc).transpose()?,
            info: w.info,
            payload: w.payload.map(EncryptedPayload::from),
            key_image: w.key_image.as_ref().map(read_pt).transpose()?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct RangeProofWire {
    pub a: Bytes32,
    pub s: Bytes32,
    pub t1: Bytes32,
    pub t2: Bytes32,
    pub tau_x: Bytes32,
    pub mu: Bytes32,
    pub t_hat: Bytes32,
    pub l: Vec<Bytes32>,
    pub r: Vec<Bytes32>,
    pub ipa_a: Bytes32,
    pub ipa_b: Bytes32,
}

impl From<&AggregatedRangeProof> for RangeProofWire {
    fn from(p: &AggregatedRangeProof) -> Self {
        Self {
            a: pt(&p.a),
            s: pt(&p.s),
            t1: pt(&p.t1),
            t2: pt(&p.t2),
            tau_x: sc(&p.tau_x),
            mu: sc(&p.mu),
            t_hat: sc(&p.t_hat),
            l: pts(&p.ipa.l),
            r: pts(&p.ipa.r),
            ipa_a: sc(&p.ipa.a),
            ipa_b: sc(&p.ipa.b),
        }
    }
}

impl TryFrom<RangeProofWire> for AggregatedRangeProof {
    type Error = PrivacyError;

    fn try_from(w: RangeProofWire) -> Result<Self> {
        Ok(Self {
            a: read_pt(&w.a)?,
            s: read_pt(&w.s)?,
            t1: read_pt(&w.t1)?,
            t2: read_pt(&w.t2)?,
            tau_x: read_sc(&w.tau_x)?,
            mu: read_sc(&w.mu)?,
            t_hat: read_sc(&w.t_hat)?,
            ipa: InnerProductProof {
                l: read_pts(&w.l)?,
                r: read_pts(&w.r)?,
                a: read_sc(&w.ipa_a)?,
                b: read_sc(&w.ipa_b)?,
            },
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct OneOutOfManyWire {
    pub cl: Vec<Bytes32>,
    pub ca: Vec<Bytes32>,
    pub cb: Vec<Bytes32>,
    pub cd: Vec<Bytes32>,
    pub f: Vec<Bytes32>,
    pub za: Vec<Bytes32>,
    pub zb: Vec<Bytes32>,
    pub zd: Bytes32,
}

impl From<&OneOutOfManyProof> for OneOutOfManyWire {
    fn from(p: &OneOutOfManyProof) -> Self {
        Self {
            cl: pts(&p.cl),
            ca: pts(&p.ca),
            cb: pts(&p.cb),
            cd: pts(&p.cd),
            f: scs(&p.f),
            za: scs(&p.za),
            zb: scs(&p.zb),
            zd: sc(&p.zd),
        }
    }
}

impl TryFrom<OneOutOfManyWire> for OneOutOfManyProof {
    type Error = PrivacyError;

    fn try_from(w: OneOutOfManyWire) -> Result<Self> {
        Ok(Self {
            cl: read_pts(&w.cl)?,
            ca: read_pts(&w.ca)?,
            cb: read_pts(&w.cb)?,
            cd: read_pts(&w.cd)?,
            f: read_scs(&w.f)?,
            za: read_scs(&w.za)?,
            zb: read_scs(&w.zb)?,
            zd: read_sc(&w.zd)?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct SerialNumberWire {
    pub t_sk: Bytes32,
    pub t_snd: Bytes32,
    pub t_sn: Bytes32,
    pub z_sk: Bytes32,
    pub z_rsk: Bytes32,
    pub z_snd: Bytes32,
    pub z_rsnd: Bytes32,
}

impl From<&SerialNumberProof> for SerialNumberWire {
    fn from(p: &SerialNumberProof) -> Self {
        Self {
            t_sk: pt(&p.t_sk),
            t_snd: pt(&p.t_snd),
            t_sn: pt(&p.t_sn),
            z_sk: sc(&p.z_sk),
            z_rsk: sc(&p.z_rsk),
            z_snd: sc(&p.z_snd),
            z_rsnd: sc(&p.z_rsnd),
        }
    }
}

impl TryFrom<SerialNumberWire> for SerialNumberProof {
    type Error = PrivacyError;

    fn try_from(w: SerialNumberWire) -> Result<Self> {
        Ok(Self {
            t_sk: read_pt(&w.t_sk)?,
            t_snd: read_pt(&w.t_snd)?,
            t_sn: read_pt(&w.t_sn)?,
            z_sk: read_sc(&w.z_sk)?,
            z_rsk: read_sc(&w.z_rsk)?,
            z_snd: read_sc(&w.z_snd)?,
            z_rsnd: read_sc(&w.z_rsnd)?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct SerialNumberNoPrivacyWire {
    pub t_pk: Bytes32,
    pub t_sn: Bytes32,
    pub z: Bytes32,
}

impl From<&SerialNumberNoPrivacyProof> for SerialNumberNoPrivacyWire {
    fn from(p: &SerialNumberNoPrivacyProof) -> Self {
        Self {
            t_pk: pt(&p.t_pk),
            t_sn: pt(&p.t_sn),
            z: sc(&p.z),
        }
    }
}

impl TryFrom<SerialNumberNoPrivacyWire> for SerialNumberNoPrivacyProof {
    type Error = PrivacyError;

    fn try_from(w: SerialNumberNoPrivacyWire) -> Result<Self> {
        Ok(Self {
            t_pk: read_pt(&w.t_pk)?,
            t_sn: read_pt(&w.t_sn)?,
            z: read_sc(&w.z)?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct SchnorrWire {
    pub e: Bytes32,
    pub z1: Bytes32,
    pub z2: Option<Bytes32>,
}

impl From<&SchnorrSignature> for SchnorrWire {
    fn from(s: &SchnorrSignature) -> Self {
        Self {
            e: sc(&s.e),
            z1: sc(&s.z1),
            z2: s.z2.as_ref().map(sc),
        }
    }
}

impl TryFrom<SchnorrWire> for SchnorrSignature {
    type Error = PrivacyError;

    fn try_from(w: SchnorrWire) -> Result<Self> {
        Ok(Self {
            e: read_sc(&w.e)?,
            z1: read_sc(&w.z1)?,
            z2: w.z2.as_ref().map(read_sc).transpose()?,
        })
    }
}

/// Ring signature bytes carried in a v2 transaction's signature field
#[derive(SchemaRead, SchemaWrite)]
pub struct MlsagWire {
    pub c0: Bytes32,
    pub r: Vec<Vec<Bytes32>>,
}

impl MlsagSignature {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let wire = MlsagWire {
            c0: sc(&self.c0),
            r: self.r.iter().map(|row| scs(row)).collect(),
        };
        wincode::serialize(&wire).map_err(encode_error)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let wire: MlsagWire = wincode::deserialize(bytes).map_err(decode_error)?;
        Ok(Self {
            c0: read_sc(&wire.c0)?,
            r: wire.r.iter().map(|row| read_scs(row)).collect::<Result<_>>()?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct ProofV1Wire {
    pub com_input_sk: Bytes32,
    pub com_input_shard: Bytes32,
    pub com_input_value: Vec<Bytes32>,
    pub com_input_snd: Vec<Bytes32>,
    pub serial_numbers: Vec<Bytes32>,
    pub commitment_indices: Vec<Vec<u64>>,
    pub one_of_many: Vec<OneOutOfManyWire>,
    pub serial_number_proofs: Vec<SerialNumberWire>,
    pub com_output_value: Vec<Bytes32>,
    pub output_coins: Vec<CoinV1Wire>,
    pub range_proof: Option<RangeProofWire>,
}

impl From<&ProofV1> for ProofV1Wire {
    fn from(p: &ProofV1) -> Self {
        Self {
            com_input_sk: pt(&p.com_input_sk),
            com_input_shard: pt(&p.com_input_shard),
            com_input_value: pts(&p.com_input_value),
            com_input_snd: pts(&p.com_input_snd),
            serial_numbers: pts(&p.serial_numbers),
            commitment_indices: p.commitment_indices.clone(),
            one_of_many: p.one_of_many.iter().map(OneOutOfManyWire::from).collect(),
            serial_number_proofs: p
                .serial_number_proofs
                .iter()
                .map(SerialNumberWire::from)
                .collect(),
            com_output_value: pts(&p.com_output_value),
            output_coins: p.output_coins.iter().map(CoinV1Wire::from).collect(),
            range_proof: p.range_proof.as_ref().map(RangeProofWire::from),
        }
    }
}

impl TryFrom<ProofV1Wire> for ProofV1 {
    type Error = PrivacyError;

    fn try_from(w: ProofV1Wire) -> Result<Self> {
        Ok(Self {
            com_input_sk: read_pt(&w.com_input_sk)?,
            com_input_shard: read_pt(&w.com_input_shard)?,
            com_input_value: read_pts(&w.com_input_value)?,
            com_input_snd: read_pts(&w.com_input_snd)?,
            serial_numbers: read_pts(&w.serial_numbers)?,
            commitment_indices: w.commitment_indices,
            one_of_many: w
                .one_of_many
                .into_iter()
                .map(OneOutOfManyProof::try_from)
                .collect::<Result<_>>()?,
            serial_number_proofs: w
                .serial_number_proofs
                .into_iter()
                .map(SerialNumberProof::try_from)
                .collect::<Result<_>>()?,
            com_output_value: read_pts(&w.com_output_value)?,
            output_coins: w
                .output_coins
                .into_iter()
                .map(CoinV1::try_from)
                .collect::<Result<_>>()?,
            range_proof: w.range_proof.map(AggregatedRangeProof::try_from).transpose()?,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct ProofV2Wire {
    pub key_images: Vec<Bytes32>,
    pub ring_indices: Vec<Vec<u64>>,
    pub output_coins: Vec<CoinV2Wire>,
    pub range_proof: Option<RangeProofWire>,
    pub confidential_asset: bool,
}

impl From<&ProofV2> for ProofV2Wire {
    fn from(p: &ProofV2) -> Self {
        Self {
            key_images: pts(&p.key_images),
            ring_indices: p.ring_indices.clone(),
            output_coins: p.output_coins.iter().map(CoinV2Wire::from).collect(),
            range_proof: p.range_proof.as_ref().map(RangeProofWire::from),
            confidential_asset: p.confidential_asset,
        }
    }
}

impl TryFrom<ProofV2Wire> for ProofV2 {
    type Error = PrivacyError;

    fn try_from(w: ProofV2Wire) -> Result<Self> {
        Ok(Self {
            key_images: read_pts(&w.key_images)?,
            ring_indices: w.ring_indices,
            output_coins: w
                .output_coins
                .into_iter()
                .map(CoinV2::try_from)
                .collect::<Result<_>>()?,
            range_proof: w.range_proof.map(AggregatedRangeProof::try_from).transpose()?,
            confidential_asset: w.confidential_asset,
        })
    }
}

#[derive(SchemaRead, SchemaWrite)]
pub struct ConversionWire {
    pub input_coins: Vec<CoinV1Wire>,
    pub serial_number_proofs: Vec<SerialNumberNoPrivacyWire>,
    pub output_coins: Vec<CoinV2Wire>,
    pub range_proof: RangeProofWire,
    pub balance_signature: SchnorrWire,
}

impl From<&ConversionProof> for ConversionWire {
    fn from(p: &ConversionProof) -> Self {
        Self {
            input_coins: p.input_coins.iter().map(CoinV1Wire::from).collect(),
            serial_number_proofs: p
                .serial_number_proofs
                .iter()
                .map(SerialNumberNoPrivacyWire::from)
                .collect(),
            output_coins: p.output_coins.iter().map(CoinV2Wire::from).collect(),
            range_proof: RangeProofWire::from(&p.range_proof),
            balance_signature: SchnorrWire::from(&p.balance_signature),
        }
    }
}

impl TryFrom<ConversionWire> for ConversionProof {
    type Error = PrivacyError;

    fn try_from(w: ConversionWire) -> Result<Self> {
        Ok(Self {
            input_coins: w
                .input_coins
                .into_iter()
                .map(CoinV1::try_from)
                .collect::<Result<_>>()?,
            serial_number_proofs: w
                .serial_number_proofs
                .into_iter()
                .map(SerialNumberNoPrivacyProof::try_from)
                .collect::<Result<_>>()?,
            output_coins: w
                .output_coins
                .into_iter()
                .map(CoinV2::try_from)
                .collect::<Result<_>>()?,
            range_proof: AggregatedRangeProof::try_from(w.range_proof)?,
            balance_signature: SchnorrSignature::try_from(w.balance_signature)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeySet;

    #[test]
    fn test_coin_v1_wire_rejects_bad_point() {
        let coin = CoinV1::new(&KeySet::random().payment_address, 3, b"x".to_vec());
        let mut wire = CoinV1Wire::from(&coin);
        wire.commitment = [0xff; 32];
        assert_eq!(CoinV1::try_from(wire), Err(PrivacyError::InvalidPoint));
    }

    #[test]
    fn test_half_sealed_coin_rejected() {
        let coin = CoinV1::new(&KeySet::random().payment_address, 3, Vec::new());
        let mut wire = CoinV1Wire::from(&coin);
        wire.ephemeral_key = Some(pt(&coin.public_key));
        assert!(matches!(CoinV1::try_from(wire), Err(PrivacyError::Decode(_))));
    }

    #[test]
    fn test_mlsag_bytes_reject_truncation() {
        let sig = MlsagSignature {
            c0: Scalar::from(5u64),
            r: vec![vec![Scalar::from(1u64), Scalar::from(2u64)]; 3],
        };
        let bytes = sig.to_bytes().unwrap();
        assert_eq!(MlsagSignature::from_bytes(&bytes).unwrap(), sig);
        assert!(MlsagSignature::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
