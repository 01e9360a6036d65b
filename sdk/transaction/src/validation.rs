//! Validation state machine.
//!
//! ```text
//! Unvalidated ──sanity──► SanityChecked ──itself──► ItselfValidated ──chain──► ChainValidated ──► Accepted
//!      │                        │                          │
//!      └────────────────────────┴──────────────────────────┴──────► Rejection { stage, error }
//! ```
//!
//! * sanity: structure only, no state and no cryptography
//! * itself: signatures and proofs, with read-only ring lookups
//! * chain: double-spend, replay and token-id checks
//!
//! Each stage is its own type, so a transaction cannot skip ahead.

use std::collections::HashSet;
use std::fmt;

use obscura_privacy::coin::{MAX_MESSAGE_SIZE, asset_base};
use obscura_privacy::{
    Coin, MlsagSignature, PrivacyError, Proof, SchnorrPublicKey, SchnorrSignature, TokenId,
    point_from_bytes, point_to_bytes,
};
use obscura_privacy::operation::scalar_to_bytes;
use thiserror::Error;
use tracing::{Span, debug, debug_span, warn};

use crate::batch::{DeferredRange, RangePartition};
use crate::env::{MAX_OUTPUTS, TxParams, ValidationEnvironment};
use crate::errors::{Result, TransactionError};
use crate::guard;
use crate::metadata::{MintAuthority, NoMinting};
use crate::sampler::{resolve_v1_rings, resolve_v2_ring};
use crate::state::{ChainState, LedgerDiff};
use crate::traits::{ProofBearing, Signable, TokenCarrying};
use crate::transaction::{TX_VERSION_1, TX_VERSION_2, Transaction, TxHash, TxType};

static NO_MINTING: NoMinting = NoMinting;

/// Everything a validation step may consult.
pub struct ValidationContext<'a> {
    pub env: ValidationEnvironment,
    pub state: &'a dyn ChainState,
    pub params: &'a TxParams,
    pub mint_authority: &'a dyn MintAuthority,
    pub span: Span,
}

impl<'a> ValidationContext<'a> {
    pub fn new(env: ValidationEnvironment, state: &'a dyn ChainState, params: &'a TxParams) -> Self {
        let span = debug_span!("validate", shard = env.shard_id, height = env.shard_height);
        Self {
            env,
            state,
            params,
            mint_authority: &NO_MINTING,
            span,
        }
    }

    pub fn with_mint_authority(mut self, authority: &'a dyn MintAuthority) -> Self {
        self.mint_authority = authority;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Something the pipeline can validate: a plain or a token transaction.
pub trait Validatable: Signable + ProofBearing + TokenCarrying {
    fn sanity_check(&self, ctx: &ValidationContext<'_>) -> Result<()>;

    /// Signatures and ring proofs now; range proofs handed back for batching.
    fn verify_deferring_range<'t>(&'t self, ctx: &ValidationContext<'_>) -> Result<Vec<DeferredRange<'t>>>;

    fn validate_by_itself(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        for deferred in self.verify_deferring_range(ctx)? {
            deferred.verify()?;
        }
        Ok(())
    }

    fn validate_against_chain(&self, ctx: &ValidationContext<'_>) -> Result<()>;

    /// State writes this makes once accepted into a block on `shard`.
    fn record(&self, diff: &mut LedgerDiff, shard: u8);
}

fn signature_error(err: PrivacyError) -> TransactionError {
    match err {
        PrivacyError::VerificationFailed(what) => TransactionError::InvalidSignature(what.to_string()),
        PrivacyError::InvalidLength { .. } | PrivacyError::InvalidScalar | PrivacyError::Decode(_) => {
            TransactionError::InvalidSignature(err.to_string())
        }
        other => other.into(),
    }
}

fn output_key(coin: &Coin) -> [u8; 32] {
    match coin {
        Coin::V1(c) => scalar_to_bytes(&c.snd),
        Coin::V2(c) => point_to_bytes(&c.public_key),
    }
}

impl Transaction {
    fn is_mint_proof(&self) -> bool {
        match &self.proof {
            Proof::V1(p) => p.is_mint(),
            Proof::V2(p) => p.is_mint(),
            Proof::Conversion(_) => false,
        }
    }

    /// Structural checks for one layer.
    pub(crate) fn check_layer_sanity(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let params = ctx.params;
        match (self.version, &self.proof) {
            (TX_VERSION_1, Proof::V1(_))
            | (TX_VERSION_2, Proof::V2(_))
            | (TX_VERSION_2, Proof::Conversion(_)) => {}
            (TX_VERSION_1 | TX_VERSION_2, proof) => {
                return Err(TransactionError::VersionMismatch {
                    version: self.version,
                    proof: proof.version(),
                });
            }
            (other, _) => return Err(TransactionError::InvalidVersion(other)),
        }
        if (self.tx_type == TxType::Conversion) != matches!(self.proof, Proof::Conversion(_)) {
            return Err(TransactionError::InvalidType(
                "conversion type and conversion proof must go together".into(),
            ));
        }

        let limit = ctx
            .env
            .confirmation_time
            .saturating_add(params.max_lock_time_drift_secs);
        if self.lock_time > limit {
            return Err(TransactionError::FutureLockTime {
                lock_time: self.lock_time,
                limit,
            });
        }
        if self.info.len() > params.max_info_size {
            return Err(TransactionError::OversizedField {
                field: "info",
                max: params.max_info_size,
                got: self.info.len(),
            });
        }
        let size = self.actual_size()?;
        if size > params.max_tx_size {
            return Err(TransactionError::OversizedField {
                field: "transaction",
                max: params.max_tx_size,
                got: size,
            });
        }

        let outputs = self.output_coins();
        if outputs.len() > MAX_OUTPUTS {
            return Err(TransactionError::CountMismatch(format!(
                "{} outputs, limit is {}",
                outputs.len(),
                MAX_OUTPUTS
            )));
        }
        self.proof.check_shape()?;

        let mint = self.is_mint_proof();
        if self.tx_type.is_mint() != mint {
            return Err(TransactionError::InvalidType(format!(
                "{:?} transaction with a {} proof",
                self.tx_type,
                if mint { "mint" } else { "spending" }
            )));
        }
        if mint && self.fee != 0 {
            return Err(TransactionError::Malformed("mints carry no fee".into()));
        }
        match &self.proof {
            Proof::V2(p) if p.is_mint() => {
                let expected = (!self.token_id.is_native()).then(|| asset_base(&self.token_id));
                if p.output_coins.iter().any(|c| c.asset_tag != expected) {
                    return Err(TransactionError::Malformed(
                        "minted coin carries the wrong asset tag".into(),
                    ));
                }
            }
            Proof::V2(p) => {
                if p.confidential_asset == self.token_id.is_native() {
                    return Err(TransactionError::InvalidType(
                        "confidential assets are used exactly for tokens".into(),
                    ));
                }
            }
            Proof::V1(p) => p.verify_outputs()?,
            Proof::Conversion(_) => {
                if !self.token_id.is_native() {
                    return Err(TransactionError::InvalidType(
                        "only the native coin converts".into(),
                    ));
                }
            }
        }

        let mut seen_outputs = HashSet::new();
        for coin in &outputs {
            coin.verify_commitment()?;
            let message_len = match coin {
                Coin::V1(c) => c.info.len(),
                Coin::V2(c) => c.info.len(),
            };
            if message_len > MAX_MESSAGE_SIZE {
                return Err(TransactionError::OversizedField {
                    field: "output message",
                    max: MAX_MESSAGE_SIZE,
                    got: message_len,
                });
            }
            if !coin.is_burning() && !seen_outputs.insert(output_key(coin)) {
                return Err(TransactionError::DuplicateInTransaction("output"));
            }
        }
        let mut seen_spends = HashSet::new();
        for id in self.proof.spent_identifiers() {
            if !seen_spends.insert(point_to_bytes(&id)) {
                return Err(TransactionError::DuplicateInTransaction("spend identifier"));
            }
        }
        if self.sig.is_empty() {
            return Err(TransactionError::InvalidSignature("missing signature".into()));
        }
        Ok(())
    }

    fn verify_mint(
        &self,
        ctx: &ValidationContext<'_>,
        env: &ValidationEnvironment,
        message: &TxHash,
        expected: Option<u64>,
    ) -> Result<()> {
        let minter = point_from_bytes(&self.sig_pub_key).map_err(signature_error)?;
        let signature = SchnorrSignature::from_bytes(&self.sig).map_err(signature_error)?;
        SchnorrPublicKey::new(minter)
            .verify(&signature, message)
            .map_err(signature_error)?;

        let minted = self.output_coins().iter().try_fold(0u64, |acc, coin| {
            let value = coin
                .value()
                .ok_or_else(|| TransactionError::Malformed("minted value is hidden".into()))?;
            acc.checked_add(value)
                .ok_or_else(|| TransactionError::Conservation("minted total overflows".into()))
        })?;
        let allowed = match expected {
            Some(amount) => amount,
            None => ctx.mint_authority.authorized_amount(self, env)?,
        };
        if minted != allowed {
            return Err(TransactionError::Conservation(format!(
                "minted {minted}, authorized {allowed}"
            )));
        }
        Ok(())
    }

    /// Signature and proofs of one layer against `message`.
    ///
    /// `expected_mint` fixes the amount a mint layer must create; without it
    /// the context's mint authority decides.
    pub(crate) fn verify_layer<'t>(
        &'t self,
        ctx: &ValidationContext<'_>,
        message: &TxHash,
        expected_mint: Option<u64>,
    ) -> Result<Vec<DeferredRange<'t>>> {
        let env = ctx.env.for_transaction(self.tx_type, self.has_privacy());
        let shard = env.shard_id;
        match &self.proof {
            Proof::V1(p) if p.is_mint() => {
                self.verify_mint(ctx, &env, message, expected_mint)?;
                Ok(Vec::new())
            }
            Proof::V2(p) if p.is_mint() => {
                self.verify_mint(ctx, &env, message, expected_mint)?;
                Ok(Vec::new())
            }
            Proof::V1(p) => {
                let key = p.balance_key(self.fee);
                if self.sig_pub_key != point_to_bytes(&key) {
                    return Err(TransactionError::InvalidSignature(
                        "signing key is not the balance key".into(),
                    ));
                }
                let signature = SchnorrSignature::from_bytes(&self.sig).map_err(signature_error)?;
                SchnorrPublicKey::new(key)
                    .verify(&signature, message)
                    .map_err(signature_error)?;

                let rings = resolve_v1_rings(ctx.state, &self.token_id, shard, &p.commitment_indices)?;
                let legacy = env.allows_ring_failure(self.lock_time);
                if legacy {
                    debug!(lock_time = self.lock_time, "legacy ring carve-out in effect");
                }
                p.verify_inputs(&rings, legacy)?;
                p.verify_outputs()?;
                let partition = if legacy {
                    RangePartition::V1Legacy
                } else {
                    RangePartition::V1
                };
                Ok(p.range_statement()
                    .map(|statement| DeferredRange {
                        partition,
                        statement,
                    })
                    .into_iter()
                    .collect())
            }
            Proof::V2(p) => {
                let members = resolve_v2_ring(ctx.state, &self.token_id, shard, &p.ring_indices)?;
                let signature = MlsagSignature::from_bytes(&self.sig).map_err(signature_error)?;
                p.verify_signature(&members, self.fee, &signature, message)
                    .map_err(signature_error)?;
                let partition = if p.confidential_asset {
                    RangePartition::V2Confidential
                } else {
                    RangePartition::V2
                };
                Ok(p.range_statement()?
                    .map(|statement| DeferredRange {
                        partition,
                        statement,
                    })
                    .into_iter()
                    .collect())
            }
            Proof::Conversion(p) => {
                let owner = point_from_bytes(&self.sig_pub_key).map_err(signature_error)?;
                let signature = SchnorrSignature::from_bytes(&self.sig).map_err(signature_error)?;
                SchnorrPublicKey::new(owner)
                    .verify(&signature, message)
                    .map_err(signature_error)?;
                p.verify_except_range(&owner, self.fee)?;
                Ok(vec![DeferredRange {
                    partition: RangePartition::V2,
                    statement: p.range_statement(),
                }])
            }
        }
    }

    /// Double-spend, replay and input-existence checks for one layer.
    pub(crate) fn check_layer_chain(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let shard = ctx.env.shard_id;
        guard::check_double_spend(self, ctx.state, shard)?;
        guard::check_replay(self, ctx.state)?;
        if let Proof::Conversion(p) = &self.proof {
            for coin in &p.input_coins {
                let commitment = point_to_bytes(&coin.commitment);
                let known = ctx
                    .state
                    .has_commitment(&TokenId::NATIVE, &commitment, shard)
                    .map_err(TransactionError::state)?;
                if !known {
                    return Err(TransactionError::UnknownInput(hex::encode(commitment)));
                }
            }
        }
        Ok(())
    }
}

impl Validatable for Transaction {
    fn sanity_check(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        if !self.token_id.is_native() {
            return Err(TransactionError::InvalidType(
                "token coins move inside a token transaction".into(),
            ));
        }
        self.check_layer_sanity(ctx)
    }

    fn verify_deferring_range<'t>(&'t self, ctx: &ValidationContext<'_>) -> Result<Vec<DeferredRange<'t>>> {
        self.verify_layer(ctx, &self.hash()?, None)
    }

    fn validate_against_chain(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        self.check_layer_chain(ctx)
    }

    fn record(&self, diff: &mut LedgerDiff, shard: u8) {
        diff.record_transaction(self, shard);
    }
}

// ============================================================================
// Stages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unvalidated,
    SanityChecked,
    ItselfValidated,
    ChainValidated,
    Accepted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Unvalidated => "unvalidated",
            Stage::SanityChecked => "sanity-checked",
            Stage::ItselfValidated => "itself-validated",
            Stage::ChainValidated => "chain-validated",
            Stage::Accepted => "accepted",
        };
        f.write_str(name)
    }
}

/// Why and where a transaction left the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rejected at {stage}: {error}")]
pub struct Rejection {
    /// Last stage the transaction reached
    pub stage: Stage,
    pub error: TransactionError,
}

fn short_hash<T: Signable>(tx: &T) -> String {
    tx.hash()
        .map(|h| hex::encode(&h[..8]))
        .unwrap_or_else(|_| "unhashable".into())
}

fn advance<T: Validatable>(
    tx: &T,
    ctx: &ValidationContext<'_>,
    from: Stage,
    check: impl FnOnce(&T) -> Result<()>,
) -> std::result::Result<(), Rejection> {
    let _entered = ctx.span.enter();
    match check(tx) {
        Ok(()) => {
            debug!(tx = %short_hash(tx), stage = %from, "stage passed");
            Ok(())
        }
        Err(error) => {
            warn!(tx = %short_hash(tx), stage = %from, kind = ?error.kind(), %error, "transaction rejected");
            Err(Rejection { stage: from, error })
        }
    }
}

#[derive(Debug)]
pub struct Unvalidated<T>(T);
#[derive(Debug)]
pub struct SanityChecked<T>(T);
#[derive(Debug)]
pub struct ItselfValidated<T>(T);
#[derive(Debug)]
pub struct ChainValidated<T>(T);
/// Final, immutable
#[derive(Debug)]
pub struct Accepted<T>(T);

impl<T: Validatable> Unvalidated<T> {
    pub fn new(tx: T) -> Self {
        Self(tx)
    }

    pub fn sanity_check(self, ctx: &ValidationContext<'_>) -> std::result::Result<SanityChecked<T>, Rejection> {
        advance(&self.0, ctx, Stage::Unvalidated, |tx| tx.sanity_check(ctx))?;
        Ok(SanityChecked(self.0))
    }
}

impl<T: Validatable> SanityChecked<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn validate_by_itself(
        self,
        ctx: &ValidationContext<'_>,
    ) -> std::result::Result<ItselfValidated<T>, Rejection> {
        advance(&self.0, ctx, Stage::SanityChecked, |tx| tx.validate_by_itself(ctx))?;
        Ok(ItselfValidated(self.0))
    }
}

impl<T: Validatable> ItselfValidated<T> {
    /// For the batch verifier, which checks the whole batch before promoting.
    pub(crate) fn trusted(tx: T) -> Self {
        Self(tx)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn validate_against_chain(
        self,
        ctx: &ValidationContext<'_>,
    ) -> std::result::Result<ChainValidated<T>, Rejection> {
        advance(&self.0, ctx, Stage::ItselfValidated, |tx| tx.validate_against_chain(ctx))?;
        Ok(ChainValidated(self.0))
    }
}

impl<T: Validatable> ChainValidated<T> {
    pub fn accept(self) -> Accepted<T> {
        Accepted(self.0)
    }
}

impl<T: Validatable> Accepted<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn record(&self, diff: &mut LedgerDiff, shard: u8) {
        self.0.record(diff, shard);
    }
}

/// Run every stage in order.
pub fn validate<T: Validatable>(tx: T, ctx: &ValidationContext<'_>) -> std::result::Result<Accepted<T>, Rejection> {
    Ok(Unvalidated::new(tx)
        .sanity_check(ctx)?
        .validate_by_itself(ctx)?
        .validate_against_chain(ctx)?
        .accept())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MintRequest, TxBuilder};
    use crate::metadata::MetadataGrants;
    use crate::state::MemoryChainState;
    use crate::transaction::MetadataRef;
    use obscura_privacy::{KeySet, PaymentInfo};

    const NOW: u64 = 1_700_000_000;

    fn reward(minter: &KeySet, amount: u64, metadata: MetadataRef) -> Transaction {
        let state = MemoryChainState::new();
        let params = TxParams::default();
        TxBuilder::new(&state, &params, 0)
            .build_mint(&MintRequest {
                minter,
                version: TX_VERSION_2,
                tx_type: TxType::Reward,
                token_id: TokenId::NATIVE,
                payments: vec![PaymentInfo::new(KeySet::random().payment_address, amount)],
                lock_time: NOW,
                metadata: Some(metadata),
            })
            .unwrap()
            .sign()
            .unwrap()
    }

    fn meta() -> MetadataRef {
        MetadataRef {
            kind: 41,
            hash: [3; 32],
        }
    }

    #[test]
    fn test_authorized_mint_accepted() {
        let tx = reward(&KeySet::random(), 70, meta());
        let state = MemoryChainState::new();
        let params = TxParams::default();
        let grants = MetadataGrants::new().grant(meta(), 70);
        let ctx = ValidationContext::new(ValidationEnvironment::new(0, NOW), &state, &params)
            .with_mint_authority(&grants);
        let accepted = validate(tx.clone(), &ctx).unwrap();
        assert_eq!(accepted.inner(), &tx);
    }

    #[test]
    fn test_mint_amount_must_match_grant() {
        let tx = reward(&KeySet::random(), 71, meta());
        let state = MemoryChainState::new();
        let params = TxParams::default();
        let grants = MetadataGrants::new().grant(meta(), 70);
        let ctx = ValidationContext::new(ValidationEnvironment::new(0, NOW), &state, &params)
            .with_mint_authority(&grants);
        let rejection = validate(tx, &ctx).unwrap_err();
        assert_eq!(rejection.stage, Stage::SanityChecked);
        assert!(matches!(rejection.error, TransactionError::Conservation(_)));
    }

    #[test]
    fn test_mint_without_authority_rejected() {
        let tx = reward(&KeySet::random(), 70, meta());
        let state = MemoryChainState::new();
        let params = TxParams::default();
        let ctx = ValidationContext::new(ValidationEnvironment::new(0, NOW), &state, &params);
        let rejection = validate(tx, &ctx).unwrap_err();
        assert!(matches!(rejection.error, TransactionError::MintNotAuthorized(_)));
    }

    #[test]
    fn test_sanity_rejections() {
        let state = MemoryChainState::new();
        let params = TxParams::default();
        let ctx = ValidationContext::new(ValidationEnvironment::new(0, NOW), &state, &params);
        let tx = reward(&KeySet::random(), 70, meta());

        let mut bad = tx.clone();
        bad.version = TX_VERSION_1;
        assert_eq!(
            bad.sanity_check(&ctx).unwrap_err(),
            TransactionError::VersionMismatch { version: 1, proof: 2 }
        );

        let mut bad = tx.clone();
        bad.version = 7;
        assert_eq!(bad.sanity_check(&ctx).unwrap_err(), TransactionError::InvalidVersion(7));

        let mut bad = tx.clone();
        bad.lock_time = NOW + params.max_lock_time_drift_secs + 1;
        assert!(matches!(
            bad.sanity_check(&ctx),
            Err(TransactionError::FutureLockTime { .. })
        ));

        let mut bad = tx.clone();
        bad.fee = 1;
        assert!(matches!(bad.sanity_check(&ctx), Err(TransactionError::Malformed(_))));

        let mut bad = tx.clone();
        bad.tx_type = TxType::Normal;
        assert!(matches!(bad.sanity_check(&ctx), Err(TransactionError::InvalidType(_))));

        let mut bad = tx.clone();
        bad.token_id = TokenId([8; 32]);
        assert!(matches!(bad.sanity_check(&ctx), Err(TransactionError::InvalidType(_))));

        let mut bad = tx.clone();
        if let Proof::V2(p) = &mut bad.proof {
            let coin = p.output_coins[0].clone();
            p.output_coins = vec![coin; MAX_OUTPUTS + 1];
        }
        assert!(matches!(bad.sanity_check(&ctx), Err(TransactionError::CountMismatch(_))));

        let mut bad = tx;
        bad.sig.clear();
        assert!(matches!(
            bad.sanity_check(&ctx),
            Err(TransactionError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_tampered_hash_breaks_signature() {
        let mut tx = reward(&KeySet::random(), 70, meta());
        tx.info = b"changed".to_vec();
        let state = MemoryChainState::new();
        let params = TxParams::default();
        let grants = MetadataGrants::new().grant(meta(), 70);
        let ctx = ValidationContext::new(ValidationEnvironment::new(0, NOW), &state, &params)
            .with_mint_authority(&grants);
        let rejection = validate(tx, &ctx).unwrap_err();
        assert_eq!(rejection.stage, Stage::SanityChecked);
        assert_eq!(rejection.error.kind(), crate::errors::ErrorKind::Crypto);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ItselfValidated.to_string(), "itself-validated");
        let rejection = Rejection {
            stage: Stage::Unvalidated,
            error: TransactionError::InvalidVersion(9),
        };
        assert!(rejection.to_string().starts_with("rejected at unvalidated"));
    }
}
