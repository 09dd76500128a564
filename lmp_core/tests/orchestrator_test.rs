// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use lmp_core::{
    adapters::NftStatusStore,
    context::memory::InMemoryContext,
    contract::ClaimRegistry,
    ledger::VoucherIssuance,
    orchestrator::{ClaimConfig, ClaimOutcome, Orchestrator, ReconcileReport},
    Error,
};
use lmp_eip712_message::Eip712SignedMessage;
use lmp_voucher::{MintVoucher, Receipt};
use rstest::*;

const RECIPIENT: &str = "0xabcd1234abcd1234abcd1234abcd1234abcd1234";

fn recipient_address() -> Address {
    RECIPIENT.parse().unwrap()
}

fn setup() -> (InMemoryContext, PrivateKeySigner) {
    let custodian = PrivateKeySigner::random();
    let registry = Arc::new(ClaimRegistry::new(
        1,
        Address::from([0x11u8; 20]),
        custodian.address(),
    ));
    (InMemoryContext::new(registry), custodian)
}

fn orchestrator(
    context: &InMemoryContext,
    custodian: &PrivateKeySigner,
    config: ClaimConfig,
) -> Orchestrator<InMemoryContext, PrivateKeySigner> {
    Orchestrator::new(
        context.registry().domain_separator().clone(),
        context.clone(),
        custodian.clone(),
        config,
    )
}

#[fixture]
fn receipt_42() -> Receipt {
    Receipt {
        id: 42,
        amount_cents: 2550,
        payer: "ada".into(),
        pot: "ski-trip".into(),
        timestamp: 1_700_000_000,
        description: "lift tickets".into(),
    }
}

#[rstest]
#[tokio::test]
async fn claim_confirms_and_flips_the_ledger(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    let issued = orchestrator
        .create_voucher(42, Some(RECIPIENT), "ada")
        .await
        .unwrap();
    let token_id = issued.voucher.message.tokenId;

    let (tx_hash, claimed_id, block_number) = match orchestrator.claim(42).await.unwrap() {
        ClaimOutcome::Confirmed {
            tx_hash,
            token_id,
            block_number,
        } => (tx_hash, token_id, block_number),
        other => panic!("expected a confirmed claim, got {other:?}"),
    };
    assert_eq!(claimed_id, token_id);
    assert!(block_number > 0);

    // chain truth
    assert_eq!(
        context.registry().owner_of(token_id),
        Some(recipient_address())
    );

    // ledger flipped atomically with the recorded tx hash
    let status = orchestrator.nft_status(42).await.unwrap().unwrap();
    assert!(status.claimed && status.minted);
    assert_eq!(status.tx_hash, Some(tx_hash));
    assert_eq!(status.owner, Some(recipient_address()));
}

#[rstest]
#[tokio::test]
async fn claiming_twice_is_a_conflict(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    orchestrator
        .create_voucher(42, Some(RECIPIENT), "ada")
        .await
        .unwrap();
    orchestrator.claim(42).await.unwrap();

    assert!(matches!(
        orchestrator.claim(42).await.unwrap_err(),
        Error::TokenAlreadyMinted { .. }
    ));
}

#[rstest]
#[tokio::test]
async fn claim_without_voucher_is_not_found() {
    let (context, custodian) = setup();
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    assert!(matches!(
        orchestrator.claim(42).await.unwrap_err(),
        Error::VoucherNotFound { receipt_id: 42 }
    ));
}

#[rstest]
#[tokio::test]
async fn slow_confirmation_returns_pending_and_reconcile_finalizes(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    let slow = context.clone().with_confirmation_delay(Duration::from_millis(200));
    let orchestrator = orchestrator(
        &slow,
        &custodian,
        ClaimConfig {
            confirmation_timeout: Duration::from_millis(10),
        },
    );

    orchestrator
        .create_voucher(42, Some(RECIPIENT), "ada")
        .await
        .unwrap();

    let outcome = orchestrator.claim(42).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Pending { .. }));

    // never assume confirmation before the timeout elapsed: the row is
    // untouched even though the simulated chain already minted
    let status = orchestrator.nft_status(42).await.unwrap().unwrap();
    assert!(!status.claimed && !status.minted);

    // asynchronous finalization via the repair pass
    let report = orchestrator.reconcile().await.unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            examined: 1,
            repaired: 1,
            divergent: 0
        }
    );
    let status = orchestrator.nft_status(42).await.unwrap().unwrap();
    assert!(status.claimed && status.minted);
}

#[rstest]
#[tokio::test]
async fn reconcile_repairs_an_out_of_band_mint(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    let issued = orchestrator
        .create_voucher(42, Some(RECIPIENT), "ada")
        .await
        .unwrap();

    // the holder redeemed the voucher directly against the registry; the
    // ledger never saw the claim
    context.registry().lazy_mint(&issued.voucher).unwrap();
    let before = orchestrator.nft_status(42).await.unwrap().unwrap();
    assert!(before.claimable && !before.claimed);

    let report = orchestrator.reconcile().await.unwrap();
    assert_eq!(report.repaired, 1);

    let status = orchestrator.nft_status(42).await.unwrap().unwrap();
    assert!(status.claimed && status.minted);
    assert_eq!(status.owner, Some(recipient_address()));
    // repaired, not reissued
    assert_eq!(status.voucher, Some(issued.voucher));
}

#[rstest]
#[tokio::test]
async fn reconcile_restores_chain_truth_when_ledger_ran_ahead(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    orchestrator
        .create_voucher(42, Some(RECIPIENT), "ada")
        .await
        .unwrap();

    // simulate a claim transaction that was reorganized away after the
    // ledger update landed
    context
        .apply_patch(
            42,
            lmp_core::ledger::NftStatusPatch {
                claimed: Some(true),
                minted: Some(true),
                owner: Some(recipient_address()),
                tx_hash: None,
            },
        )
        .await
        .unwrap();

    let report = orchestrator.reconcile().await.unwrap();
    assert_eq!(report.divergent, 1);

    let status = orchestrator.nft_status(42).await.unwrap().unwrap();
    assert!(!status.claimed && !status.minted);
    // the voucher itself survives: the ledger stays authoritative for it
    assert!(status.claimable && status.voucher.is_some());
}

#[rstest]
#[tokio::test]
async fn forged_voucher_claims_are_forbidden_without_detail(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    // a voucher signed by a key without the minter role, smuggled into the
    // ledger by a hypothetical compromised writer
    let forger = PrivateKeySigner::random();
    let voucher = MintVoucher {
        tokenId: U256::from(1234u64),
        uri: "ipfs://forged".into(),
        recipient: recipient_address(),
        receiptId: U256::from(42u64),
        nonce: U256::from(0u64),
    };
    let signed = Eip712SignedMessage::new(
        context.registry().domain_separator(),
        voucher,
        &forger,
    )
    .unwrap();
    context
        .init_voucher(
            42,
            VoucherIssuance {
                voucher: signed,
                metadata_uri: "ipfs://forged".into(),
            },
        )
        .await
        .unwrap();

    let err = orchestrator.claim(42).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden));
    assert_eq!(err.to_string(), "forbidden");
    assert!(!context.registry().is_minted(U256::from(1234u64)));
}

#[rstest]
#[tokio::test]
async fn stats_aggregate_the_ledger_snapshot(receipt_42: Receipt) {
    let (context, custodian) = setup();
    context.insert_receipt(receipt_42);
    context.insert_receipt(Receipt {
        id: 43,
        amount_cents: 700,
        payer: "grace".into(),
        pot: "ski-trip".into(),
        timestamp: 1_700_000_100,
        description: "cocoa".into(),
    });
    let orchestrator = orchestrator(&context, &custodian, ClaimConfig::default());

    orchestrator
        .create_voucher(42, Some(RECIPIENT), "ada")
        .await
        .unwrap();
    orchestrator
        .create_voucher(43, Some(RECIPIENT), "grace")
        .await
        .unwrap();
    orchestrator.claim(42).await.unwrap();

    let stats = orchestrator.collection_stats().await.unwrap();
    assert_eq!(stats.vouchers_issued, 2);
    assert_eq!(stats.tokens_minted, 1);
    assert_eq!(stats.pending_claims, 1);
    assert!((stats.percent_minted - 50.0).abs() < f64::EPSILON);
}
