//! Two-layer token transactions.
//!
//! ```text
//! ┌──────────────────────── TokenTransaction ────────────────────────┐
//! │  outer: Transaction (native coin, pays the fee)                  │
//! │  token_data: TokenData                                           │
//! │     id, name, symbol, amount, mintable, kind                     │
//! │     tx: Transaction (token coins, no fee)                        │
//! └──────────────────────────────────────────────────────────────────┘
//!
//!   both layers sign  combined_hash(outer.hash, token_data.hash)
//! ```
//!
//! * Init: the inner layer mints exactly `amount` to one recipient
//! * Transfer: the inner layer spends earlier token coins
//! * CrossShard: the inner layer materialises coins sent from another shard

use obscura_privacy::{CoinV1, CoinV2, KeySet, PaymentAddress, PaymentInfo, Proof, TokenId};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wincode::{SchemaRead, SchemaWrite};

use crate::batch::DeferredRange;
use crate::builder::{MintRequest, PaymentRequest, TxBuilder, UnsignedTransaction};
use crate::errors::{Result, TransactionError};
use crate::state::{LedgerDiff, TokenInfo};
use crate::traits::{ProofBearing, Signable, TokenCarrying};
use crate::transaction::{
    MetadataRef, TX_VERSION_1, TX_VERSION_2, Transaction, TxHash, TxType, combined_hash,
};
use crate::validation::{Validatable, ValidationContext};

const TOKEN_DATA_DOMAIN: &str = "obscura 2025 token data";
const TOKEN_ID_DOMAIN: &str = "obscura 2025 token id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Init,
    Transfer,
    CrossShard,
}

impl TokenKind {
    fn tag(self) -> u8 {
        match self {
            TokenKind::Init => 0,
            TokenKind::Transfer => 1,
            TokenKind::CrossShard => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub amount: u64,
    pub mintable: bool,
    pub kind: TokenKind,
    /// Inner layer, denominated in `token_id`
    pub tx: Transaction,
}

#[derive(SchemaRead, SchemaWrite)]
struct TokenDataPreimage {
    kind: u8,
    token_id: [u8; 32],
    name: String,
    symbol: String,
    amount: u64,
    mintable: bool,
    inner: [u8; 32],
}

#[derive(SchemaRead, SchemaWrite)]
struct TokenIdPreimage {
    name: String,
    symbol: String,
    amount: u64,
    shard: u8,
}

fn encode_error(e: impl std::fmt::Display) -> TransactionError {
    TransactionError::Malformed(e.to_string())
}

impl TokenData {
    /// Hash of the token fields and the inner layer's hash.
    pub fn hash(&self) -> Result<TxHash> {
        let preimage = TokenDataPreimage {
            kind: self.kind.tag(),
            token_id: self.token_id.0,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            amount: self.amount,
            mintable: self.mintable,
            inner: self.tx.hash()?,
        };
        let bytes = wincode::serialize(&preimage).map_err(encode_error)?;
        let mut hasher = blake3::Hasher::new_derive_key(TOKEN_DATA_DOMAIN);
        hasher.update(&bytes);
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Identifier of a non-mintable token issued on `shard`.
pub fn derive_token_id(name: &str, symbol: &str, amount: u64, shard: u8) -> Result<TokenId> {
    let preimage = TokenIdPreimage {
        name: name.to_owned(),
        symbol: symbol.to_owned(),
        amount,
        shard,
    };
    let bytes = wincode::serialize(&preimage).map_err(encode_error)?;
    let mut hasher = blake3::Hasher::new_derive_key(TOKEN_ID_DOMAIN);
    hasher.update(&bytes);
    Ok(TokenId(*hasher.finalize().as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub outer: Transaction,
    pub token_data: TokenData,
}

impl TokenTransaction {
    pub fn inner(&self) -> &Transaction {
        &self.token_data.tx
    }

    /// Sign both layers over the combined hash.
    pub fn sign_layers(
        outer: UnsignedTransaction,
        inner: UnsignedTransaction,
        token_data: impl FnOnce(Transaction) -> TokenData,
    ) -> Result<TokenTransaction> {
        let mut token_data = token_data(inner.tx.clone());
        let message = combined_hash(&outer.tx.hash()?, &token_data.hash()?);
        let outer = outer.sign_message(&message)?;
        token_data.tx = inner.sign_message(&message)?;
        Ok(TokenTransaction { outer, token_data })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(encode_error)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(encode_error)
    }

    fn check_token_rules(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let outer = &self.outer;
        let inner = self.inner();
        let data = &self.token_data;

        if !outer.token_id.is_native() || outer.tx_type != TxType::Normal {
            return Err(TransactionError::InvalidType(
                "the fee layer is a native transfer".into(),
            ));
        }
        if data.token_id.is_native() || data.token_id == TokenId::CONFIDENTIAL_ASSET {
            return Err(TransactionError::InvalidType(format!(
                "{} is reserved",
                hex::encode(data.token_id.0)
            )));
        }
        if inner.token_id != data.token_id {
            return Err(TransactionError::Malformed(
                "inner layer is denominated in another token".into(),
            ));
        }
        if inner.version != outer.version {
            return Err(TransactionError::VersionMismatch {
                version: outer.version,
                proof: inner.proof.version(),
            });
        }
        if inner.fee != 0 {
            return Err(TransactionError::Malformed(
                "the token layer carries no fee".into(),
            ));
        }

        match data.kind {
            TokenKind::Init => {
                if inner.tx_type != TxType::Mint {
                    return Err(TransactionError::InvalidType(
                        "token init mints its supply".into(),
                    ));
                }
                if inner.proof.output_count() != 1 {
                    return Err(TransactionError::CountMismatch(format!(
                        "token init pays one recipient, found {} outputs",
                        inner.proof.output_count()
                    )));
                }
                if data.mintable && inner.metadata.is_none() {
                    return Err(TransactionError::Malformed(
                        "mintable tokens are issued against metadata".into(),
                    ));
                }
                if !data.mintable {
                    let expected =
                        derive_token_id(&data.name, &data.symbol, data.amount, ctx.env.shard_id)?;
                    if expected != data.token_id {
                        return Err(TransactionError::Malformed(
                            "token id does not match its metadata".into(),
                        ));
                    }
                }
            }
            TokenKind::Transfer => {
                if inner.tx_type != TxType::Normal {
                    return Err(TransactionError::InvalidType(
                        "token transfers spend existing coins".into(),
                    ));
                }
            }
            TokenKind::CrossShard => {
                if inner.tx_type != TxType::Mint {
                    return Err(TransactionError::InvalidType(
                        "cross-shard token transfers have no inputs".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn token_known(&self, ctx: &ValidationContext<'_>) -> Result<bool> {
        let id = self.token_data.token_id;
        if ctx
            .state
            .token_id_exists(&id)
            .map_err(TransactionError::state)?
        {
            return Ok(true);
        }
        let bridged = ctx
            .state
            .get_all_bridge_tokens()
            .map_err(TransactionError::state)?;
        Ok(bridged.iter().any(|t| t.token_id == id))
    }
}

impl Signable for TokenTransaction {
    fn hash(&self) -> Result<TxHash> {
        Ok(combined_hash(&self.outer.hash()?, &self.token_data.hash()?))
    }
}

impl ProofBearing for TokenTransaction {
    fn proof(&self) -> &Proof {
        &self.outer.proof
    }

    fn fee(&self) -> u64 {
        self.outer.fee
    }

    fn actual_size(&self) -> Result<usize> {
        let data = &self.token_data;
        // id, amount, mintable flag, kind
        let fixed = 32 + 8 + 1 + 1;
        Ok(self.outer.actual_size()?
            + data.tx.actual_size()?
            + data.name.len()
            + data.symbol.len()
            + fixed)
    }

    fn layers(&self) -> Vec<&Transaction> {
        vec![&self.outer, &self.token_data.tx]
    }
}

impl TokenCarrying for TokenTransaction {
    fn token_id(&self) -> TokenId {
        self.token_data.token_id
    }

    fn token_data(&self) -> Option<&TokenData> {
        Some(&self.token_data)
    }
}

impl Validatable for TokenTransaction {
    fn sanity_check(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        self.outer.check_layer_sanity(ctx)?;
        self.inner().check_layer_sanity(ctx)?;
        self.check_token_rules(ctx)?;
        let size = ProofBearing::actual_size(self)?;
        if size > ctx.params.max_tx_size {
            return Err(TransactionError::OversizedField {
                field: "token transaction",
                max: ctx.params.max_tx_size,
                got: size,
            });
        }
        Ok(())
    }

    fn verify_deferring_range<'t>(&'t self, ctx: &ValidationContext<'_>) -> Result<Vec<DeferredRange<'t>>> {
        let message = self.signing_message()?;
        let data = &self.token_data;
        let expected_mint = match data.kind {
            TokenKind::Init if data.mintable => {
                let inner = self.inner();
                let env = ctx.env.for_transaction(inner.tx_type, inner.has_privacy());
                let allowed = ctx.mint_authority.authorized_amount(inner, &env)?;
                if allowed != data.amount {
                    return Err(TransactionError::Conservation(format!(
                        "token declares {}, authorized {allowed}",
                        data.amount
                    )));
                }
                Some(allowed)
            }
            TokenKind::Init => Some(data.amount),
            TokenKind::Transfer | TokenKind::CrossShard => None,
        };
        let mut deferred = self.outer.verify_layer(ctx, &message, None)?;
        deferred.extend(self.inner().verify_layer(ctx, &message, expected_mint)?);
        Ok(deferred)
    }

    fn validate_against_chain(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        self.outer.check_layer_chain(ctx)?;
        self.inner().check_layer_chain(ctx)?;
        let id = self.token_data.token_id;
        match self.token_data.kind {
            TokenKind::Init => {
                if self.token_known(ctx)? {
                    return Err(TransactionError::TokenIdExists(id));
                }
            }
            TokenKind::Transfer | TokenKind::CrossShard => {
                if !self.token_known(ctx)? {
                    return Err(TransactionError::UnknownToken(id));
                }
            }
        }
        Ok(())
    }

    fn record(&self, diff: &mut LedgerDiff, shard: u8) {
        diff.record_transaction(&self.outer, shard);
        diff.record_transaction(self.inner(), shard);
        if self.token_data.kind == TokenKind::Init {
            let data = &self.token_data;
            diff.record_token(TokenInfo {
                token_id: data.token_id,
                name: data.name.clone(),
                symbol: data.symbol.clone(),
                amount: data.amount,
                mintable: data.mintable,
            });
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Coins a layer spends; the variant fixes the layer's version.
#[derive(Debug, Clone)]
pub enum SpendCoins {
    V1(Vec<CoinV1>),
    V2(Vec<CoinV2>),
}

impl SpendCoins {
    pub fn version(&self) -> u8 {
        match self {
            SpendCoins::V1(_) => TX_VERSION_1,
            SpendCoins::V2(_) => TX_VERSION_2,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            SpendCoins::V1(c) => c.is_empty(),
            SpendCoins::V2(c) => c.is_empty(),
        }
    }
}

/// Issue a new token.
#[derive(Debug, Clone)]
pub struct TokenInitParams<'k> {
    /// Native fee layer; its sender also signs the mint
    pub fee: PaymentRequest<'k>,
    pub fee_coins: SpendCoins,
    pub name: String,
    pub symbol: String,
    pub amount: u64,
    /// `None` issues a fixed supply under an id derived from name, symbol and amount
    pub mintable: Option<MintableIssue>,
    pub recipient: PaymentAddress,
}

/// A mintable token: its id is assigned elsewhere and its supply is
/// released by a metadata object the mint authority recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintableIssue {
    pub token_id: TokenId,
    pub metadata: MetadataRef,
}

/// Move existing token coins.
#[derive(Debug, Clone)]
pub struct TokenTransferParams<'k> {
    pub fee: PaymentRequest<'k>,
    pub fee_coins: SpendCoins,
    pub token_id: TokenId,
    pub payments: Vec<PaymentInfo>,
    pub token_coins: SpendCoins,
}

/// Materialise token coins that another shard sent here.
#[derive(Debug, Clone)]
pub struct TokenCrossShardParams<'k> {
    pub fee: PaymentRequest<'k>,
    pub fee_coins: SpendCoins,
    pub token_id: TokenId,
    pub payments: Vec<PaymentInfo>,
    /// Cross-shard receipt authorizing the outputs
    pub metadata: MetadataRef,
}

fn check_fee_layer(fee: &PaymentRequest<'_>, coins: &SpendCoins) -> Result<()> {
    if !fee.token_id.is_native() {
        return Err(TransactionError::InvalidType(
            "the fee layer is paid in the native coin".into(),
        ));
    }
    if coins.is_empty() {
        return Err(TransactionError::CountMismatch("no coins to pay the fee".into()));
    }
    Ok(())
}

fn check_token_id(token_id: &TokenId) -> Result<()> {
    if token_id.is_native() || *token_id == TokenId::CONFIDENTIAL_ASSET {
        return Err(TransactionError::InvalidType(format!(
            "{} is reserved",
            hex::encode(token_id.0)
        )));
    }
    Ok(())
}

impl TokenInitParams<'_> {
    pub fn validate(&self) -> Result<()> {
        check_fee_layer(&self.fee, &self.fee_coins)?;
        if self.name.is_empty() || self.symbol.is_empty() {
            return Err(TransactionError::Malformed(
                "token name and symbol must be set".into(),
            ));
        }
        if self.amount == 0 {
            return Err(TransactionError::Conservation("token supply is zero".into()));
        }
        if let Some(issue) = &self.mintable {
            check_token_id(&issue.token_id)?;
        }
        Ok(())
    }
}

impl TokenTransferParams<'_> {
    pub fn validate(&self) -> Result<()> {
        check_fee_layer(&self.fee, &self.fee_coins)?;
        check_token_id(&self.token_id)?;
        if self.token_coins.is_empty() {
            return Err(TransactionError::CountMismatch("no token coins to spend".into()));
        }
        if self.token_coins.version() != self.fee_coins.version() {
            return Err(TransactionError::VersionMismatch {
                version: self.fee_coins.version(),
                proof: self.token_coins.version(),
            });
        }
        Ok(())
    }
}

impl TokenCrossShardParams<'_> {
    pub fn validate(&self) -> Result<()> {
        check_fee_layer(&self.fee, &self.fee_coins)?;
        check_token_id(&self.token_id)?;
        if self.payments.is_empty() {
            return Err(TransactionError::CountMismatch("no outputs requested".into()));
        }
        Ok(())
    }
}

impl TxBuilder<'_> {
    fn build_spend(&self, request: &PaymentRequest<'_>, coins: &SpendCoins) -> Result<UnsignedTransaction> {
        match coins {
            SpendCoins::V1(coins) => self.build_v1(request, coins),
            SpendCoins::V2(coins) => self.build_v2(request, coins),
        }
    }

    fn token_mint(
        &self,
        minter: &KeySet,
        version: u8,
        token_id: TokenId,
        payments: Vec<PaymentInfo>,
        lock_time: u64,
        metadata: Option<MetadataRef>,
    ) -> Result<UnsignedTransaction> {
        self.build_mint(&MintRequest {
            minter,
            version,
            tx_type: TxType::Mint,
            token_id,
            payments,
            lock_time,
            metadata,
        })
    }

    pub fn build_token_init(&self, params: &TokenInitParams<'_>) -> Result<TokenTransaction> {
        params.validate()?;
        let (token_id, metadata) = match params.mintable {
            Some(issue) => (issue.token_id, Some(issue.metadata)),
            None => (
                derive_token_id(&params.name, &params.symbol, params.amount, self.shard())?,
                None,
            ),
        };
        let mintable = metadata.is_some();
        let version = params.fee_coins.version();
        let outer = self.build_spend(&params.fee, &params.fee_coins)?;
        let inner = self.token_mint(
            params.fee.sender,
            version,
            token_id,
            vec![PaymentInfo::new(params.recipient, params.amount)],
            params.fee.lock_time,
            metadata,
        )?;
        debug!(token = %hex::encode(token_id.0), mintable, "built token init");
        TokenTransaction::sign_layers(outer, inner, |tx| TokenData {
            token_id,
            name: params.name.clone(),
            symbol: params.symbol.clone(),
            amount: params.amount,
            mintable,
            kind: TokenKind::Init,
            tx,
        })
    }

    pub fn build_token_transfer(&self, params: &TokenTransferParams<'_>) -> Result<TokenTransaction> {
        params.validate()?;
        let outer = self.build_spend(&params.fee, &params.fee_coins)?;
        let request = PaymentRequest::new(
            params.fee.sender,
            params.payments.clone(),
            0,
            params.fee.lock_time,
        )
        .with_token(params.token_id);
        let inner = self.build_spend(&request, &params.token_coins)?;
        TokenTransaction::sign_layers(outer, inner, |tx| TokenData {
            token_id: params.token_id,
            name: String::new(),
            symbol: String::new(),
            amount: 0,
            mintable: false,
            kind: TokenKind::Transfer,
            tx,
        })
    }

    pub fn build_token_cross_shard(&self, params: &TokenCrossShardParams<'_>) -> Result<TokenTransaction> {
        params.validate()?;
        let version = params.fee_coins.version();
        let outer = self.build_spend(&params.fee, &params.fee_coins)?;
        let inner = self.token_mint(
            params.fee.sender,
            version,
            params.token_id,
            params.payments.clone(),
            params.fee.lock_time,
            Some(params.metadata),
        )?;
        let amount = params.payments.iter().map(|p| p.amount).fold(0u64, u64::saturating_add);
        TokenTransaction::sign_layers(outer, inner, |tx| TokenData {
            token_id: params.token_id,
            name: String::new(),
            symbol: String::new(),
            amount,
            mintable: false,
            kind: TokenKind::CrossShard,
            tx,
        })
    }
}
