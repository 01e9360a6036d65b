//! Batched range-proof verification.
//!
//! Signatures and ring proofs are checked one transaction at a time; range
//! proofs are collected per partition and checked with one randomized
//! multi-exponentiation each. A failure is traced back to the lowest index
//! of a failing transaction.

use std::collections::HashMap;

use obscura_privacy::RangeStatement;
use obscura_privacy::bulletproofs::batch_verify;
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::{Result, TransactionError};
use crate::validation::{ItselfValidated, SanityChecked, Validatable, ValidationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangePartition {
    V1,
    /// v1 transactions validated under the legacy ring carve-out
    V1Legacy,
    V2,
    /// v2 token transfers, committed under an asset tag
    V2Confidential,
}

impl RangePartition {
    pub const ALL: [RangePartition; 4] = [
        RangePartition::V1,
        RangePartition::V1Legacy,
        RangePartition::V2,
        RangePartition::V2Confidential,
    ];
}

/// A range proof whose check was postponed to the batch.
pub struct DeferredRange<'t> {
    pub partition: RangePartition,
    pub statement: RangeStatement<'t>,
}

impl DeferredRange<'_> {
    pub fn verify(&self) -> Result<()> {
        self.statement
            .proof
            .verify(&self.statement.commitments, &self.statement.value_base)
            .map_err(TransactionError::Proof)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transaction {index} failed: {error}")]
pub struct BatchFailure {
    pub index: usize,
    pub error: TransactionError,
}

/// Validate already sanity-checked transactions by themselves, batching their range proofs.
pub fn batch_validate<T: Validatable>(
    txs: &[T],
    ctx: &ValidationContext<'_>,
) -> std::result::Result<(), BatchFailure> {
    let _entered = ctx.span.enter();
    let mut failure: Option<BatchFailure> = None;
    let mut partitions: HashMap<RangePartition, (Vec<RangeStatement<'_>>, Vec<usize>)> =
        HashMap::new();

    for (index, tx) in txs.iter().enumerate() {
        match tx.verify_deferring_range(ctx) {
            Ok(deferred) => {
                for d in deferred {
                    let (statements, owners) = partitions.entry(d.partition).or_default();
                    statements.push(d.statement);
                    owners.push(index);
                }
            }
            Err(error) => {
                // later transactions cannot lower the failing index
                failure = Some(BatchFailure { index, error });
                break;
            }
        }
    }

    for partition in RangePartition::ALL {
        let Some((statements, owners)) = partitions.get(&partition) else {
            continue;
        };
        debug!(?partition, statements = statements.len(), "batch verifying range proofs");
        if let Err((position, error)) = batch_verify(statements) {
            let Some(&index) = owners.get(position) else {
                continue;
            };
            if failure.as_ref().is_none_or(|f| index < f.index) {
                failure = Some(BatchFailure {
                    index,
                    error: TransactionError::Proof(error),
                });
            }
        }
    }

    match failure {
        Some(failure) => {
            warn!(index = failure.index, error = %failure.error, "batch rejected");
            Err(failure)
        }
        None => Ok(()),
    }
}

/// Promote a whole batch to `ItselfValidated`, or report the failing index.
pub fn validate_batch<T: Validatable>(
    txs: Vec<SanityChecked<T>>,
    ctx: &ValidationContext<'_>,
) -> std::result::Result<Vec<ItselfValidated<T>>, BatchFailure> {
    let inner: Vec<T> = txs.into_iter().map(SanityChecked::into_inner).collect();
    batch_validate(&inner, ctx)?;
    Ok(inner.into_iter().map(ItselfValidated::trusted).collect())
}
