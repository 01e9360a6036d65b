mod common;

use common::*;
use obscura_privacy::{Coin, KeySet, PaymentInfo, TokenId};
use obscura_transaction::{
    LedgerDiff, MemoryChainState, MetadataGrants, MetadataRef, MintRequest, MintableIssue,
    PaymentRequest, SpendCoins, Stage, TokenCrossShardParams, TokenData, TokenInfo,
    TokenInitParams, TokenKind, TokenTransaction, TokenTransferParams, TransactionError, TxBuilder,
    TxParams, TxType, Validatable, derive_token_id, validate,
};

fn init_params<'k>(issuer: &'k KeySet, fee_coin: obscura_privacy::CoinV2, amount: u64) -> TokenInitParams<'k> {
    TokenInitParams {
        fee: PaymentRequest::new(issuer, Vec::new(), 10, NOW),
        fee_coins: SpendCoins::V2(vec![fee_coin]),
        name: "Gold".into(),
        symbol: "GLD".into(),
        amount,
        mintable: None,
        recipient: issuer.payment_address,
    }
}

#[test]
fn init_then_transfer() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let issuer = KeySet::random_in_shard(SHARD);
    let recipient = KeySet::random();
    let fee_coins = fund_v2(&mut state, &issuer, &[100, 100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);

    let builder = TxBuilder::new(&state, &params, SHARD);
    let init = builder
        .build_token_init(&init_params(&issuer, fee_coins[0].clone(), 10_000))
        .unwrap();
    let token_id = init.token_data.token_id;
    assert_eq!(token_id, derive_token_id("Gold", "GLD", 10_000, SHARD).unwrap());
    assert_eq!(init.inner().tx_type, TxType::Mint);

    let accepted = validate(init.clone(), &context(&state, &params)).unwrap();
    let mut diff = LedgerDiff::new();
    accepted.record(&mut diff, SHARD);
    assert_eq!(diff.tokens.len(), 1);
    state.apply(&diff);

    let Coin::V2(minted) = &init.inner().output_coins()[0] else {
        panic!("v2 token init minted a v1 coin");
    };
    let minted = minted.reveal(&issuer).unwrap();
    assert_eq!(minted.value, Some(10_000));
    seed_v2_decoys(&mut state, &TokenId([77; 32]), minted.shard(), 10);

    let builder = TxBuilder::new(&state, &params, SHARD);
    let transfer = builder
        .build_token_transfer(&TokenTransferParams {
            fee: PaymentRequest::new(&issuer, Vec::new(), 10, NOW),
            fee_coins: SpendCoins::V2(vec![fee_coins[1].clone()]),
            token_id,
            payments: vec![PaymentInfo::new(recipient.payment_address, 4_000)],
            token_coins: SpendCoins::V2(vec![minted]),
        })
        .unwrap();
    assert_eq!(transfer.token_data.kind, TokenKind::Transfer);
    assert!(transfer.inner().proof.spent_identifiers().len() == 1);
    validate(transfer.clone(), &context(&state, &params)).unwrap();

    let Coin::V2(paid) = &transfer.inner().output_coins()[0] else {
        panic!("v2 token transfer paid a v1 coin");
    };
    assert_eq!(paid.reveal(&recipient).unwrap().value, Some(4_000));
    assert!(paid.asset_blinder(&recipient, &token_id).is_ok());
}

#[test]
fn reissuing_a_token_is_rejected() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let issuer = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &issuer, &[100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
    let init = TxBuilder::new(&state, &params, SHARD)
        .build_token_init(&init_params(&issuer, fee_coins[0].clone(), 500))
        .unwrap();

    let id = init.token_data.token_id;
    let mut diff = LedgerDiff::new();
    diff.record_token(TokenInfo {
        token_id: id,
        name: "Gold".into(),
        symbol: "GLD".into(),
        amount: 500,
        mintable: false,
    });
    state.apply(&diff);

    let rejection = validate(init, &context(&state, &params)).unwrap_err();
    assert_eq!(rejection.stage, Stage::ItselfValidated);
    assert_eq!(rejection.error, TransactionError::TokenIdExists(id));
}

#[test]
fn transfer_before_init_is_rejected() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let owner = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &owner, &[100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);

    let token_id = TokenId([42; 32]);
    let token_coin = v2_coin(&owner, 50, Some(&token_id), SHARD);
    state.store_coin(&token_id, &Coin::V2(token_coin.clone()));
    seed_v2_decoys(&mut state, &TokenId([43; 32]), SHARD, 10);

    let transfer = TxBuilder::new(&state, &params, SHARD)
        .build_token_transfer(&TokenTransferParams {
            fee: PaymentRequest::new(&owner, Vec::new(), 10, NOW),
            fee_coins: SpendCoins::V2(fee_coins),
            token_id,
            payments: vec![PaymentInfo::new(KeySet::random().payment_address, 50)],
            token_coins: SpendCoins::V2(vec![token_coin]),
        })
        .unwrap();
    let rejection = validate(transfer.clone(), &context(&state, &params)).unwrap_err();
    assert_eq!(rejection.error, TransactionError::UnknownToken(token_id));

    // a recognised bridge token is enough
    state.register_bridge_token(TokenInfo {
        token_id,
        name: "Bridged".into(),
        symbol: "BRG".into(),
        amount: 0,
        mintable: true,
    });
    assert!(validate(transfer, &context(&state, &params)).is_ok());
}

#[test]
fn init_minting_other_than_declared_supply_is_rejected() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let issuer = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &issuer, &[100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
    let token_id = derive_token_id("Gold", "GLD", 10_000, SHARD).unwrap();

    let builder = TxBuilder::new(&state, &params, SHARD);
    let outer = builder
        .build_v2(&PaymentRequest::new(&issuer, Vec::new(), 10, NOW), &fee_coins)
        .unwrap();
    let inner = builder
        .build_mint(&MintRequest {
            minter: &issuer,
            version: 2,
            tx_type: TxType::Mint,
            token_id,
            payments: vec![PaymentInfo::new(issuer.payment_address, 690)],
            lock_time: NOW,
            metadata: None,
        })
        .unwrap();
    let tx = TokenTransaction::sign_layers(outer, inner, |tx| TokenData {
        token_id,
        name: "Gold".into(),
        symbol: "GLD".into(),
        amount: 10_000,
        mintable: false,
        kind: TokenKind::Init,
        tx,
    })
    .unwrap();

    let rejection = validate(tx, &context(&state, &params)).unwrap_err();
    assert_eq!(rejection.stage, Stage::SanityChecked);
    assert!(matches!(rejection.error, TransactionError::Conservation(_)));
}

#[test]
fn mintable_init_needs_a_matching_grant() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let issuer = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &issuer, &[100, 100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
    let token_id = TokenId([0x55; 32]);
    let receipt = MetadataRef { kind: 24, hash: [0x66; 32] };

    let builder = TxBuilder::new(&state, &params, SHARD);
    let init = builder
        .build_token_init(&TokenInitParams {
            mintable: Some(MintableIssue { token_id, metadata: receipt }),
            ..init_params(&issuer, fee_coins[0].clone(), u64::MAX / 2)
        })
        .unwrap();
    assert!(init.token_data.mintable);
    assert_eq!(init.inner().metadata, Some(receipt));

    // nobody vouches for the supply
    let rejection = validate(init.clone(), &context(&state, &params)).unwrap_err();
    assert_eq!(rejection.stage, Stage::SanityChecked);
    assert!(matches!(rejection.error, TransactionError::MintNotAuthorized(_)));

    let other_token = MetadataGrants::new().grant_token(receipt, TokenId([0x56; 32]), u64::MAX / 2);
    let rejection = validate(
        init.clone(),
        &context(&state, &params).with_mint_authority(&other_token),
    )
    .unwrap_err();
    assert!(matches!(rejection.error, TransactionError::MintNotAuthorized(_)));

    let smaller = MetadataGrants::new().grant_token(receipt, token_id, 1_000);
    let rejection = validate(
        init.clone(),
        &context(&state, &params).with_mint_authority(&smaller),
    )
    .unwrap_err();
    assert!(matches!(rejection.error, TransactionError::Conservation(_)));

    let granted = MetadataGrants::new().grant_token(receipt, token_id, u64::MAX / 2);
    assert!(validate(init, &context(&state, &params).with_mint_authority(&granted)).is_ok());

    // a mintable init without metadata is refused before any proof is checked
    let outer = builder
        .build_v2(&PaymentRequest::new(&issuer, Vec::new(), 10, NOW), &fee_coins[1..])
        .unwrap();
    let inner = builder
        .build_mint(&MintRequest {
            minter: &issuer,
            version: 2,
            tx_type: TxType::Mint,
            token_id,
            payments: vec![PaymentInfo::new(issuer.payment_address, 500)],
            lock_time: NOW,
            metadata: None,
        })
        .unwrap();
    let bare = TokenTransaction::sign_layers(outer, inner, |tx| TokenData {
        token_id,
        name: "Gold".into(),
        symbol: "GLD".into(),
        amount: 500,
        mintable: true,
        kind: TokenKind::Init,
        tx,
    })
    .unwrap();
    let rejection = validate(bare, &context(&state, &params).with_mint_authority(&granted)).unwrap_err();
    assert_eq!(rejection.stage, Stage::Unvalidated);
    assert!(matches!(rejection.error, TransactionError::Malformed(_)));
}

#[test]
fn cross_shard_transfer_of_unknown_token_is_rejected() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let sender = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &sender, &[100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
    let token_id = TokenId([61; 32]);
    let receipt = MetadataRef { kind: 25, hash: [0x77; 32] };

    let arrival = TxBuilder::new(&state, &params, SHARD)
        .build_token_cross_shard(&TokenCrossShardParams {
            fee: PaymentRequest::new(&sender, Vec::new(), 10, NOW),
            fee_coins: SpendCoins::V2(fee_coins),
            token_id,
            payments: vec![PaymentInfo::new(KeySet::random().payment_address, 300)],
            metadata: receipt,
        })
        .unwrap();
    assert_eq!(arrival.token_data.kind, TokenKind::CrossShard);

    let grants = MetadataGrants::new().grant_token(receipt, token_id, 300);
    let rejection = validate(
        arrival.clone(),
        &context(&state, &params).with_mint_authority(&grants),
    )
    .unwrap_err();
    assert_eq!(rejection.stage, Stage::ItselfValidated);
    assert_eq!(rejection.error, TransactionError::UnknownToken(token_id));

    state.register_bridge_token(TokenInfo {
        token_id,
        name: "Bridged".into(),
        symbol: "BRG".into(),
        amount: 0,
        mintable: true,
    });
    assert!(validate(arrival, &context(&state, &params).with_mint_authority(&grants)).is_ok());
}

#[test]
fn a_failing_layer_fails_the_whole() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let issuer = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &issuer, &[100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
    let init = TxBuilder::new(&state, &params, SHARD)
        .build_token_init(&init_params(&issuer, fee_coins[0].clone(), 500))
        .unwrap();

    let mut renamed = init.clone();
    renamed.token_data.name = "Silver".into();
    assert!(matches!(
        renamed.sanity_check(&context(&state, &params)),
        Err(TransactionError::Malformed(_))
    ));

    let mut resigned = init.clone();
    resigned.token_data.tx.sig = init.outer.sig.clone();
    assert!(resigned.validate_by_itself(&context(&state, &params)).is_err());

    let mut fee_bumped = init;
    fee_bumped.outer.fee += 1;
    assert!(validate(fee_bumped, &context(&state, &params)).is_err());
}

#[test]
fn token_json_round_trip_keeps_hash_and_validity() {
    let mut state = MemoryChainState::new();
    let params = TxParams::default();
    let issuer = KeySet::random_in_shard(SHARD);
    let fee_coins = fund_v2(&mut state, &issuer, &[100]);
    seed_v2_decoys(&mut state, &TokenId::NATIVE, SHARD, 10);
    let init = TxBuilder::new(&state, &params, SHARD)
        .build_token_init(&init_params(&issuer, fee_coins[0].clone(), 500))
        .unwrap();

    let back = TokenTransaction::from_json(&init.to_json().unwrap()).unwrap();
    assert_eq!(back, init);
    assert_eq!(
        obscura_transaction::Signable::hash(&back).unwrap(),
        obscura_transaction::Signable::hash(&init).unwrap()
    );
    assert!(validate(back, &context(&state, &params)).is_ok());
}
