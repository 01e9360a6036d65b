//! Authorization of no-input transactions.
//!
//! Coinbase, reward, return-stake and bridge mints create coins from nothing.
//! What makes one legitimate lives in its metadata object, which this layer
//! does not interpret; a [`MintAuthority`] does.

use std::collections::HashMap;

use obscura_privacy::TokenId;

use crate::env::ValidationEnvironment;
use crate::errors::{Result, TransactionError};
use crate::transaction::{MetadataRef, Transaction};

pub trait MintAuthority: Send + Sync {
    /// Amount `tx` may mint in `env`, or why it may not.
    fn authorized_amount(&self, tx: &Transaction, env: &ValidationEnvironment) -> Result<u64>;
}

/// Refuses every mint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMinting;

impl MintAuthority for NoMinting {
    fn authorized_amount(&self, _tx: &Transaction, _env: &ValidationEnvironment) -> Result<u64> {
        Err(TransactionError::MintNotAuthorized(
            "no mint authority configured".into(),
        ))
    }
}

/// What one metadata object releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grant {
    token_id: TokenId,
    amount: u64,
}

/// Fixed table of metadata objects and the amounts they release.
#[derive(Debug, Clone, Default)]
pub struct MetadataGrants {
    grants: HashMap<MetadataRef, Grant>,
}

impl MetadataGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release `amount` of the native coin.
    pub fn grant(self, metadata: MetadataRef, amount: u64) -> Self {
        self.grant_token(metadata, TokenId::NATIVE, amount)
    }

    /// Release `amount` of `token_id`; the metadata is worthless for any other token.
    pub fn grant_token(mut self, metadata: MetadataRef, token_id: TokenId, amount: u64) -> Self {
        self.grants.insert(metadata, Grant { token_id, amount });
        self
    }
}

impl MintAuthority for MetadataGrants {
    fn authorized_amount(&self, tx: &Transaction, _env: &ValidationEnvironment) -> Result<u64> {
        let metadata = tx.metadata.as_ref().ok_or_else(|| {
            TransactionError::MintNotAuthorized("mint carries no metadata".into())
        })?;
        let grant = self.grants.get(metadata).ok_or_else(|| {
            TransactionError::MintNotAuthorized(format!(
                "metadata {} of kind {} is not granted",
                hex::encode(metadata.hash),
                metadata.kind
            ))
        })?;
        if grant.token_id != tx.token_id {
            return Err(TransactionError::MintNotAuthorized(format!(
                "metadata {} releases {}, not {}",
                hex::encode(metadata.hash),
                hex::encode(grant.token_id.0),
                hex::encode(tx.token_id.0)
            )));
        }
        Ok(grant.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxType;
    use obscura_privacy::{Proof, ProofV2};

    fn mint(token_id: TokenId, metadata: Option<MetadataRef>) -> Transaction {
        Transaction {
            version: 2,
            tx_type: TxType::Mint,
            lock_time: 0,
            fee: 0,
            token_id,
            info: Vec::new(),
            sig_pub_key: Vec::new(),
            sig: Vec::new(),
            proof: Proof::V2(ProofV2::mint(Vec::new())),
            metadata,
        }
    }

    #[test]
    fn test_grant_is_bound_to_its_token() {
        let receipt = MetadataRef { kind: 7, hash: [5; 32] };
        let gold = TokenId([6; 32]);
        let grants = MetadataGrants::new().grant_token(receipt, gold, 300);
        let env = ValidationEnvironment::new(0, 0);

        assert_eq!(grants.authorized_amount(&mint(gold, Some(receipt)), &env), Ok(300));
        assert!(matches!(
            grants.authorized_amount(&mint(TokenId([8; 32]), Some(receipt)), &env),
            Err(TransactionError::MintNotAuthorized(_))
        ));
        assert!(matches!(
            grants.authorized_amount(&mint(TokenId::NATIVE, Some(receipt)), &env),
            Err(TransactionError::MintNotAuthorized(_))
        ));
        assert!(matches!(
            grants.authorized_amount(&mint(gold, None), &env),
            Err(TransactionError::MintNotAuthorized(_))
        ));
        assert!(NoMinting.authorized_amount(&mint(gold, Some(receipt)), &env).is_err());
    }
}
