//! The transaction type and its canonical hash.
//!
//! ```text
//! hash = blake3_derive_key("obscura 2025 transaction hash",
//!          wincode(version, type, lock_time, fee, token_id, info, proof, metadata))
//! ```
//!
//! The signature pair (`sig`, `sig_pub_key`) is left out of the pre-image, so
//! signing never changes the hash and every other field is bound by it.

use obscura_privacy::{Coin, Proof, TokenId};
use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use crate::errors::{Result, TransactionError};
use crate::state::ledger_token;

const TX_HASH_DOMAIN: &str = "obscura 2025 transaction hash";

pub type TxHash = [u8; 32];

pub const TX_VERSION_1: u8 = 1;
pub const TX_VERSION_2: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    /// Private transfer
    Normal,
    /// Coinbase or bridge mint
    Mint,
    Reward,
    ReturnStake,
    /// Plain v1 coins into v2 coins
    Conversion,
}

impl TxType {
    pub fn tag(self) -> u8 {
        match self {
            TxType::Normal => 0,
            TxType::Mint => 1,
            TxType::Reward => 2,
            TxType::ReturnStake => 3,
            TxType::Conversion => 4,
        }
    }

    /// No inputs; outputs authorized by metadata
    pub fn is_mint(self) -> bool {
        matches!(self, TxType::Mint | TxType::Reward | TxType::ReturnStake)
    }
}

/// Pointer to the metadata object that authorizes a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataRef {
    pub kind: u16,
    #[serde(with = "hex")]
    pub hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub tx_type: TxType,
    /// Unix seconds
    pub lock_time: u64,
    pub fee: u64,
    pub token_id: TokenId,
    #[serde(with = "hex")]
    pub info: Vec<u8>,
    #[serde(with = "hex")]
    pub sig_pub_key: Vec<u8>,
    #[serde(with = "hex")]
    pub sig: Vec<u8>,
    pub proof: Proof,
    #[serde(default)]
    pub metadata: Option<MetadataRef>,
}

#[derive(SchemaRead, SchemaWrite)]
struct MetadataWire {
    kind: u16,
    hash: [u8; 32],
}

#[derive(SchemaRead, SchemaWrite)]
struct HashPreimage {
    version: u8,
    tx_type: u8,
    lock_time: u64,
    fee: u64,
    token_id: [u8; 32],
    info: Vec<u8>,
    proof: Vec<u8>,
    metadata: Option<MetadataWire>,
}

fn encode_error(e: impl std::fmt::Display) -> TransactionError {
    TransactionError::Malformed(e.to_string())
}

impl Transaction {
    fn preimage(&self) -> Result<Vec<u8>> {
        let preimage = HashPreimage {
            version: self.version,
            tx_type: self.tx_type.tag(),
            lock_time: self.lock_time,
            fee: self.fee,
            token_id: self.token_id.0,
            info: self.info.clone(),
            proof: self.proof.to_bytes()?,
            metadata: self.metadata.map(|m| MetadataWire {
                kind: m.kind,
                hash: m.hash,
            }),
        };
        wincode::serialize(&preimage).map_err(encode_error)
    }

    /// Content hash over every field except the signature pair.
    pub fn hash(&self) -> Result<TxHash> {
        let preimage = self.preimage()?;
        let mut hasher = blake3::Hasher::new_derive_key(TX_HASH_DOMAIN);
        hasher.update(&preimage);
        Ok(*hasher.finalize().as_bytes())
    }

    /// Encoded size: the hash pre-image plus the signature pair.
    pub fn actual_size(&self) -> Result<usize> {
        Ok(self.preimage()?.len() + self.sig.len() + self.sig_pub_key.len())
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    /// Token id the spend identifiers of this transaction are recorded under.
    pub fn spend_ledger_token(&self) -> TokenId {
        let version = match self.proof {
            Proof::V2(_) => 2,
            Proof::V1(_) | Proof::Conversion(_) => 1,
        };
        ledger_token(&self.token_id, version)
    }

    pub fn has_privacy(&self) -> bool {
        !self.tx_type.is_mint() && self.tx_type != TxType::Conversion
    }

    pub fn output_coins(&self) -> Vec<Coin> {
        self.proof.output_coins()
    }

    /// Whether any output pays the burning address.
    pub fn is_burning(&self) -> bool {
        self.proof.output_coins().iter().any(Coin::is_burning)
    }

    /// Total paid to the burning address by outputs whose value is public.
    pub fn burned_amount(&self) -> u64 {
        self.proof
            .output_coins()
            .iter()
            .filter(|c| c.is_burning())
            .filter_map(Coin::value)
            .fold(0u64, u64::saturating_add)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(encode_error)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TransactionError::Malformed(e.to_string()))
    }
}

/// Hash of `outer ‖ token data`, signed by both layers of a token transaction.
pub fn combined_hash(outer: &TxHash, token_data: &TxHash) -> TxHash {
    let mut hasher = blake3::Hasher::new_derive_key(TX_HASH_DOMAIN);
    hasher.update(outer);
    hasher.update(token_data);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_privacy::{CoinV2, KeySet, PaymentInfo, ProofV2};
    use obscura_privacy::operation::random_scalar;

    fn mint_tx() -> Transaction {
        let to = KeySet::random();
        let (coin, _) = CoinV2::derive(
            &PaymentInfo::new(to.payment_address, 25),
            0,
            &random_scalar(),
            None,
            false,
        );
        Transaction {
            version: TX_VERSION_2,
            tx_type: TxType::Mint,
            lock_time: 100,
            fee: 0,
            token_id: TokenId::NATIVE,
            info: b"coinbase".to_vec(),
            sig_pub_key: Vec::new(),
            sig: Vec::new(),
            proof: Proof::V2(ProofV2::mint(vec![coin])),
            metadata: Some(MetadataRef {
                kind: 1,
                hash: [7u8; 32],
            }),
        }
    }

    #[test]
    fn test_hash_ignores_signature_pair() {
        let tx = mint_tx();
        let mut signed = tx.clone();
        signed.sig = vec![1; 64];
        signed.sig_pub_key = vec![2; 32];
        assert_eq!(tx.hash().unwrap(), signed.hash().unwrap());
        assert!(signed.actual_size().unwrap() > tx.actual_size().unwrap());
    }

    #[test]
    fn test_hash_binds_every_field() {
        let tx = mint_tx();
        let base = tx.hash().unwrap();

        let mutations: Vec<Box<dyn Fn(&mut Transaction)>> = vec![
            Box::new(|t| t.lock_time += 1),
            Box::new(|t| t.fee = 1),
            Box::new(|t| t.info.push(0)),
            Box::new(|t| t.token_id = TokenId([1; 32])),
            Box::new(|t| t.tx_type = TxType::Reward),
            Box::new(|t| t.metadata = None),
        ];
        for mutate in mutations {
            let mut changed = tx.clone();
            mutate(&mut changed);
            assert_ne!(changed.hash().unwrap(), base);
        }
    }

    #[test]
    fn test_json_round_trip_keeps_hash() {
        let tx = mint_tx();
        let json = tx.to_json().unwrap();
        let back = Transaction::from_json(&json).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.hash().unwrap(), tx.hash().unwrap());
    }

    #[test]
    fn test_mint_types() {
        assert!(TxType::Reward.is_mint());
        assert!(!TxType::Conversion.is_mint());
        assert!(!mint_tx().has_privacy());
        assert!(!mint_tx().is_burning());
    }

    #[test]
    fn test_garbage_json_is_typed_error() {
        assert!(matches!(
            Transaction::from_json("{\"version\": 2"),
            Err(TransactionError::Malformed(_))
        ));
    }
}
