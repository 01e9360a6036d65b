//! Batched range-proof verification
//!
//! Every statement contributes its identity check scaled by a fresh random
//! weight; the sum is evaluated with a single MSM. When the sum is not the
//! identity, [`find_invalid`] bisects the batch to report the lowest failing
//! statement.

use crate::bulletproofs::AggregatedRangeProof;
use crate::errors::{PrivacyError, Result};
use crate::multiexp::MultiScalar;
use crate::operation::{Point, random_scalar};

/// One range proof and what it is checked against.
#[derive(Debug, Clone)]
pub struct RangeStatement<'a> {
    pub proof: &'a AggregatedRangeProof,
    pub commitments: Vec<Point>,
    pub value_base: Point,
}

fn combined(statements: &[RangeStatement<'_>]) -> Result<MultiScalar> {
    let mut total = MultiScalar::new();
    for statement in statements {
        let ms = statement.proof.verification_scalars(
            &statement.commitments,
            &statement.value_base,
            &random_scalar(),
        )?;
        total.concat_scaled(ms, &random_scalar());
    }
    Ok(total)
}

/// Check all statements at once.
///
/// On failure the error names the lowest failing index.
pub fn batch_verify(statements: &[RangeStatement<'_>]) -> std::result::Result<(), (usize, PrivacyError)> {
    if statements.is_empty() {
        return Ok(());
    }
    match combined(statements) {
        Ok(ms) if ms.is_identity() => Ok(()),
        _ => {
            let index = find_invalid(statements).unwrap_or(0);
            let err = match statements[index]
                .proof
                .verify(&statements[index].commitments, &statements[index].value_base)
            {
                Err(e) => e,
                Ok(()) => PrivacyError::VerificationFailed("range proof batch"),
            };
            Err((index, err))
        }
    }
}

/// Lowest index whose statement fails, by bisection.
pub fn find_invalid(statements: &[RangeStatement<'_>]) -> Option<usize> {
    let holds = |range: &[RangeStatement<'_>]| match combined(range) {
        Ok(ms) => ms.is_identity(),
        Err(_) => false,
    };

    if statements.is_empty() || holds(statements) {
        return None;
    }
    let mut lo = 0;
    let mut hi = statements.len();
    // [lo, hi) always contains a failing statement
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if holds(&statements[lo..mid]) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::PEDERSEN;
    use crate::operation::Scalar;

    fn make(values: &[u64]) -> (AggregatedRangeProof, Vec<Point>) {
        let base = PEDERSEN.g_value();
        let rs: Vec<Scalar> = values.iter().map(|_| random_scalar()).collect();
        let proof = AggregatedRangeProof::prove(values, &rs, &base).unwrap();
        let commitments = values
            .iter()
            .zip(&rs)
            .map(|(v, r)| base * Scalar::from(*v) + PEDERSEN.g_rand() * r)
            .collect();
        (proof, commitments)
    }

    #[test]
    fn test_batch_accepts_valid() {
        let items: Vec<_> = [&[1u64][..], &[2, 3], &[4, 5, 6]]
            .iter()
            .map(|v| make(v))
            .collect();
        let statements: Vec<_> = items
            .iter()
            .map(|(p, c)| RangeStatement {
                proof: p,
                commitments: c.clone(),
                value_base: PEDERSEN.g_value(),
            })
            .collect();
        assert!(batch_verify(&statements).is_ok());
        assert_eq!(find_invalid(&statements), None);
    }

    #[test]
    fn test_batch_reports_lowest_failure() {
        let items: Vec<_> = (0..5u64).map(|i| make(&[i, i + 1])).collect();
        let mut statements: Vec<_> = items
            .iter()
            .map(|(p, c)| RangeStatement {
                proof: p,
                commitments: c.clone(),
                value_base: PEDERSEN.g_value(),
            })
            .collect();
        statements[3].commitments[0] += PEDERSEN.g_value();
        statements[4].commitments[1] += PEDERSEN.g_value();

        let (index, _) = batch_verify(&statements).unwrap_err();
        assert_eq!(index, 3);
    }
}
