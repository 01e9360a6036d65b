//! Capabilities shared by plain and token transactions.
//!
//! Validation, the double-spend guard and the batch verifier are written
//! against these traits, so a [`TokenTransaction`](crate::token::TokenTransaction)
//! goes through the same pipeline as a [`Transaction`] by delegating to its
//! layers.

use obscura_privacy::{Proof, TokenId};

use crate::errors::Result;
use crate::token::TokenData;
use crate::transaction::{Transaction, TxHash};

pub trait Signable {
    fn hash(&self) -> Result<TxHash>;

    /// Message the signatures cover.
    fn signing_message(&self) -> Result<TxHash> {
        self.hash()
    }
}

pub trait ProofBearing {
    /// Proof of the fee-paying layer.
    fn proof(&self) -> &Proof;

    fn fee(&self) -> u64;

    fn actual_size(&self) -> Result<usize>;

    /// Every plain transaction carried, outer layer first.
    fn layers(&self) -> Vec<&Transaction>;
}

pub trait TokenCarrying {
    fn token_id(&self) -> TokenId;

    fn token_data(&self) -> Option<&TokenData> {
        None
    }
}

impl Signable for Transaction {
    fn hash(&self) -> Result<TxHash> {
        Transaction::hash(self)
    }
}

impl ProofBearing for Transaction {
    fn proof(&self) -> &Proof {
        &self.proof
    }

    fn fee(&self) -> u64 {
        self.fee
    }

    fn actual_size(&self) -> Result<usize> {
        Transaction::actual_size(self)
    }

    fn layers(&self) -> Vec<&Transaction> {
        vec![self]
    }
}

impl TokenCarrying for Transaction {
    fn token_id(&self) -> TokenId {
        self.token_id
    }
}
