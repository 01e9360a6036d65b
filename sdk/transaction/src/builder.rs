//! Transaction assembly.
//!
//! ```text
//! request ──► limits ──► change ──► rings (sampler) ──► outputs ──► proof ──► UnsignedTransaction
//!                                                                                 │
//!                                         sign() over hash / sign_message(m) ◄────┘
//! ```
//!
//! Version-2 outputs get a fresh one-time address per attempt until one lands
//! on the recipient's shard and is not already persisted.

use obscura_privacy::coin::{CoinV1, MAX_MESSAGE_SIZE, v2::asset_blinder};
use obscura_privacy::operation::{random_scalar, scalar_to_bytes};
use obscura_privacy::proof::conversion::MAX_CONVERSION_INPUTS;
use obscura_privacy::proof::{InputV2, OutputV1, OutputV2};
use obscura_privacy::{
    CoinV2, ConversionProof, KeySet, Mlsag, PaymentInfo, Proof, ProofV1, ProofV2, Scalar,
    SchnorrPrivateKey, TokenId, is_burning_key, point_to_bytes,
};
use tracing::{debug, warn};

use crate::env::{MAX_OUTPUTS, TxParams};
use crate::errors::{Result, TransactionError};
use crate::sampler::{sample_v1_rings, sample_v2_ring};
use crate::state::{ChainState, ledger_token};
use crate::transaction::{MetadataRef, TX_VERSION_1, TX_VERSION_2, Transaction, TxHash, TxType};

/// A transfer to build.
#[derive(Debug, Clone)]
pub struct PaymentRequest<'k> {
    pub sender: &'k KeySet,
    pub token_id: TokenId,
    pub payments: Vec<PaymentInfo>,
    pub fee: u64,
    pub lock_time: u64,
    pub info: Vec<u8>,
    pub metadata: Option<MetadataRef>,
}

impl<'k> PaymentRequest<'k> {
    pub fn new(sender: &'k KeySet, payments: Vec<PaymentInfo>, fee: u64, lock_time: u64) -> Self {
        Self {
            sender,
            token_id: TokenId::NATIVE,
            payments,
            fee,
            lock_time,
            info: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_token(mut self, token_id: TokenId) -> Self {
        self.token_id = token_id;
        self
    }

    pub fn with_info(mut self, info: Vec<u8>) -> Self {
        self.info = info;
        self
    }
}

/// A no-input mint to build.
#[derive(Debug, Clone)]
pub struct MintRequest<'k> {
    pub minter: &'k KeySet,
    pub version: u8,
    pub tx_type: TxType,
    pub token_id: TokenId,
    pub payments: Vec<PaymentInfo>,
    pub lock_time: u64,
    pub metadata: Option<MetadataRef>,
}

enum TxSigner {
    Schnorr(SchnorrPrivateKey),
    Ring(Mlsag),
}

/// A fully proven transaction still waiting for its signature.
pub struct UnsignedTransaction {
    pub tx: Transaction,
    signer: TxSigner,
}

impl UnsignedTransaction {
    /// Sign the transaction's own hash.
    pub fn sign(self) -> Result<Transaction> {
        let message = self.tx.hash()?;
        self.sign_message(&message)
    }

    /// Sign an arbitrary 32-byte message, as token layers do.
    pub fn sign_message(self, message: &TxHash) -> Result<Transaction> {
        let mut tx = self.tx;
        tx.sig = match self.signer {
            TxSigner::Schnorr(key) => key.sign(message).to_bytes(),
            TxSigner::Ring(signer) => signer.sign(message).0.to_bytes()?,
        };
        Ok(tx)
    }
}

pub struct TxBuilder<'a> {
    state: &'a dyn ChainState,
    params: &'a TxParams,
    shard: u8,
}

impl<'a> TxBuilder<'a> {
    pub fn new(state: &'a dyn ChainState, params: &'a TxParams, shard: u8) -> Self {
        Self {
            state,
            params,
            shard,
        }
    }

    /// Shard the builder spends from.
    pub fn shard(&self) -> u8 {
        self.shard
    }

    fn check_payments(&self, payments: &[PaymentInfo], info: &[u8]) -> Result<u64> {
        if payments.len() > MAX_OUTPUTS {
            return Err(TransactionError::CountMismatch(format!(
                "{} outputs requested, limit is {MAX_OUTPUTS}",
                payments.len()
            )));
        }
        if info.len() > self.params.max_info_size {
            return Err(TransactionError::OversizedField {
                field: "info",
                max: self.params.max_info_size,
                got: info.len(),
            });
        }
        let mut total: u64 = 0;
        for payment in payments {
            if payment.message.len() > MAX_MESSAGE_SIZE {
                return Err(TransactionError::OversizedField {
                    field: "payment message",
                    max: MAX_MESSAGE_SIZE,
                    got: payment.message.len(),
                });
            }
            total = total
                .checked_add(payment.amount)
                .ok_or_else(|| TransactionError::Conservation("payment total overflows".into()))?;
        }
        Ok(total)
    }

    /// Requested payments plus change back to the sender.
    fn with_change(
        &self,
        request: &PaymentRequest<'_>,
        input_total: u64,
    ) -> Result<Vec<PaymentInfo>> {
        let paid = self.check_payments(&request.payments, &request.info)?;
        let spent = paid
            .checked_add(request.fee)
            .ok_or_else(|| TransactionError::Conservation("fee overflows".into()))?;
        let change = input_total.checked_sub(spent).ok_or_else(|| {
            TransactionError::Conservation(format!("inputs hold {input_total}, need {spent}"))
        })?;
        let mut payments = request.payments.clone();
        if change > 0 {
            payments.push(PaymentInfo::new(request.sender.payment_address, change));
            if payments.len() > MAX_OUTPUTS {
                return Err(TransactionError::CountMismatch(
                    "no room for the change output".into(),
                ));
            }
        }
        if payments.is_empty() {
            return Err(TransactionError::CountMismatch(
                "transaction would have no outputs".into(),
            ));
        }
        Ok(payments)
    }

    fn check_input_shards(&self, shards: impl Iterator<Item = u8>) -> Result<()> {
        for shard in shards {
            if shard != self.shard {
                return Err(TransactionError::Malformed(format!(
                    "input coin is on shard {shard}, builder spends from shard {}",
                    self.shard
                )));
            }
        }
        Ok(())
    }

    /// v1 output coin with a serial-number derivator unused on chain.
    fn v1_output(&self, token_id: &TokenId, payment: &PaymentInfo) -> Result<CoinV1> {
        let token = ledger_token(token_id, 1);
        for _ in 0..self.params.max_ota_attempts {
            let coin = CoinV1::new(&payment.address, payment.amount, payment.message.clone());
            if is_burning_key(&coin.public_key) {
                return Ok(coin);
            }
            let used = self
                .state
                .has_snd(&token, &scalar_to_bytes(&coin.snd), coin.shard())
                .map_err(TransactionError::state)?;
            if !used {
                return Ok(coin);
            }
        }
        Err(TransactionError::OtaExhausted {
            attempts: self.params.max_ota_attempts,
        })
    }

    /// v2 output whose one-time address is on the recipient's shard and unused.
    fn v2_output(
        &self,
        token_id: &TokenId,
        payment: &PaymentInfo,
        index: u32,
        asset: Option<&TokenId>,
        blind_asset: bool,
    ) -> Result<OutputV2> {
        let token = ledger_token(token_id, 2);
        let target = payment.address.shard();
        for attempt in 0..self.params.max_ota_attempts {
            let (coin, shared) = CoinV2::derive(payment, index, &random_scalar(), asset, blind_asset);
            if !coin.is_burning() {
                if coin.shard() != target {
                    continue;
                }
                let exists = self
                    .state
                    .has_one_time_address(&token, &point_to_bytes(&coin.public_key), target)
                    .map_err(TransactionError::state)?;
                if exists {
                    debug!(attempt, "one-time address already persisted, retrying");
                    continue;
                }
            }
            let blinder = if asset.is_some() && blind_asset {
                asset_blinder(&shared, index)
            } else {
                Scalar::from(0u64)
            };
            return Ok(OutputV2 {
                coin,
                shared_secret: shared,
                asset_blinder: blinder,
            });
        }
        warn!(attempts = self.params.max_ota_attempts, "one-time address search exhausted");
        Err(TransactionError::OtaExhausted {
            attempts: self.params.max_ota_attempts,
        })
    }

    fn v2_outputs(
        &self,
        token_id: &TokenId,
        payments: &[PaymentInfo],
        asset: Option<&TokenId>,
        blind_asset: bool,
    ) -> Result<Vec<OutputV2>> {
        payments
            .iter()
            .enumerate()
            .map(|(i, p)| self.v2_output(token_id, p, i as u32, asset, blind_asset))
            .collect()
    }

    /// Private v1 transfer spending revealed coins owned by the sender.
    pub fn build_v1(
        &self,
        request: &PaymentRequest<'_>,
        coins: &[CoinV1],
    ) -> Result<UnsignedTransaction> {
        self.check_input_shards(coins.iter().map(CoinV1::shard))?;
        let input_total = sum_values(coins.iter().map(|c| c.value))?;
        let payments = self.with_change(request, input_total)?;

        let inputs = sample_v1_rings(self.state, &request.token_id, self.shard, coins)?;
        let outputs = payments
            .iter()
            .map(|p| {
                Ok(OutputV1 {
                    coin: self.v1_output(&request.token_id, p)?,
                    transmission_key: p.address.transmission_key,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (proof, key) =
            ProofV1::prove(&request.sender.spending_key, &inputs, &outputs, request.fee)?;
        let tx = Transaction {
            version: TX_VERSION_1,
            tx_type: TxType::Normal,
            lock_time: request.lock_time,
            fee: request.fee,
            token_id: request.token_id,
            info: request.info.clone(),
            sig_pub_key: point_to_bytes(key.public_key()).to_vec(),
            sig: Vec::new(),
            proof: Proof::V1(proof),
            metadata: request.metadata,
        };
        debug!(inputs = coins.len(), outputs = payments.len(), "built v1 transaction");
        Ok(UnsignedTransaction {
            tx,
            signer: TxSigner::Schnorr(key),
        })
    }

    /// Private v2 transfer. Token transfers use confidential assets and carry no fee.
    pub fn build_v2(
        &self,
        request: &PaymentRequest<'_>,
        coins: &[CoinV2],
    ) -> Result<UnsignedTransaction> {
        self.check_input_shards(coins.iter().map(CoinV2::shard))?;
        let confidential = !request.token_id.is_native();
        if confidential && request.fee != 0 {
            return Err(TransactionError::Malformed(
                "token transfers pay their fee in the outer layer".into(),
            ));
        }
        let input_total = sum_values(coins.iter().map(|c| c.value))?;
        let payments = self.with_change(request, input_total)?;

        let mut inputs = Vec::with_capacity(coins.len());
        for coin in coins {
            let asset_blinder = if confidential {
                coin.asset_blinder(request.sender, &request.token_id)?
            } else {
                Scalar::from(0u64)
            };
            inputs.push(InputV2 {
                coin: coin.clone(),
                private_key: coin.private_key(request.sender)?,
                asset_blinder,
            });
        }
        let ring = sample_v2_ring(
            self.state,
            &request.token_id,
            self.shard,
            coins,
            self.params.ring_size,
        )?;
        let asset = confidential.then_some(&request.token_id);
        let outputs = self.v2_outputs(&request.token_id, &payments, asset, true)?;

        let (proof, signer) = ProofV2::prove(&inputs, &ring, &outputs, request.fee, confidential)?;
        let tx = Transaction {
            version: TX_VERSION_2,
            tx_type: TxType::Normal,
            lock_time: request.lock_time,
            fee: request.fee,
            token_id: request.token_id,
            info: request.info.clone(),
            sig_pub_key: Vec::new(),
            sig: Vec::new(),
            proof: Proof::V2(proof),
            metadata: request.metadata,
        };
        debug!(
            inputs = coins.len(),
            outputs = payments.len(),
            confidential,
            "built v2 transaction"
        );
        Ok(UnsignedTransaction {
            tx,
            signer: TxSigner::Ring(signer),
        })
    }

    /// No-input mint with public outputs, signed by the minter's spending key.
    pub fn build_mint(&self, request: &MintRequest<'_>) -> Result<UnsignedTransaction> {
        if !request.tx_type.is_mint() {
            return Err(TransactionError::InvalidType(format!(
                "{:?} is not a mint type",
                request.tx_type
            )));
        }
        if request.payments.is_empty() {
            return Err(TransactionError::CountMismatch("no outputs requested".into()));
        }
        self.check_payments(&request.payments, &[])?;
        let proof = match request.version {
            TX_VERSION_1 => {
                let coins = request
                    .payments
                    .iter()
                    .map(|p| self.v1_output(&request.token_id, p))
                    .collect::<Result<Vec<_>>>()?;
                Proof::V1(ProofV1::mint(coins)?)
            }
            TX_VERSION_2 => {
                let asset = (!request.token_id.is_native()).then_some(&request.token_id);
                let coins = self
                    .v2_outputs(&request.token_id, &request.payments, asset, false)?
                    .into_iter()
                    .map(|o| o.coin)
                    .collect();
                Proof::V2(ProofV2::mint(coins))
            }
            other => return Err(TransactionError::InvalidVersion(other)),
        };
        let key = SchnorrPrivateKey::new(*request.minter.spending_key.scalar(), None);
        let tx = Transaction {
            version: request.version,
            tx_type: request.tx_type,
            lock_time: request.lock_time,
            fee: 0,
            token_id: request.token_id,
            info: Vec::new(),
            sig_pub_key: point_to_bytes(key.public_key()).to_vec(),
            sig: Vec::new(),
            proof,
            metadata: request.metadata,
        };
        Ok(UnsignedTransaction {
            tx,
            signer: TxSigner::Schnorr(key),
        })
    }

    /// Convert plain v1 coins into private v2 coins.
    pub fn build_conversion(
        &self,
        request: &PaymentRequest<'_>,
        coins: &[CoinV1],
    ) -> Result<UnsignedTransaction> {
        if !request.token_id.is_native() {
            return Err(TransactionError::InvalidType(
                "only the native coin converts".into(),
            ));
        }
        if coins.is_empty() || coins.len() > MAX_CONVERSION_INPUTS {
            return Err(TransactionError::CountMismatch(format!(
                "conversion spends 1 to {} coins, got {}",
                MAX_CONVERSION_INPUTS,
                coins.len()
            )));
        }
        self.check_input_shards(coins.iter().map(CoinV1::shard))?;
        let input_total = sum_values(coins.iter().map(|c| c.value))?;
        let payments = self.with_change(request, input_total)?;
        let outputs = self.v2_outputs(&request.token_id, &payments, None, false)?;

        let sk = &request.sender.spending_key;
        let proof = ConversionProof::prove(sk, coins, &outputs, request.fee)?;
        let key = SchnorrPrivateKey::new(*sk.scalar(), None);
        let tx = Transaction {
            version: TX_VERSION_2,
            tx_type: TxType::Conversion,
            lock_time: request.lock_time,
            fee: request.fee,
            token_id: TokenId::NATIVE,
            info: request.info.clone(),
            sig_pub_key: point_to_bytes(key.public_key()).to_vec(),
            sig: Vec::new(),
            proof: Proof::Conversion(proof),
            metadata: request.metadata,
        };
        Ok(UnsignedTransaction {
            tx,
            signer: TxSigner::Schnorr(key),
        })
    }
}

fn sum_values(values: impl Iterator<Item = Option<u64>>) -> Result<u64> {
    values.fold(Ok(0u64), |acc, value| {
        let value = value.ok_or_else(|| {
            TransactionError::Malformed("input coin must be revealed before spending".into())
        })?;
        acc?.checked_add(value)
            .ok_or_else(|| TransactionError::Conservation("input total overflows".into()))
    })
}
