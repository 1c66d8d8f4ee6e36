//! Submission flow of LedgerClient against the scripted chain.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::U256;

use credchain_core::{ContentLocator, Fingerprint};
use credchain_ledger::rpc::memory::{MemoryRpc, ReceiptBehavior};
use credchain_ledger::{
    ChainError, ChainRpc, FeeEstimate, Ledger, LedgerClient, LedgerConfig, LedgerError,
};

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const CHAIN_ID: u64 = 80002;

fn config() -> LedgerConfig {
    LedgerConfig {
        contract_address: CONTRACT.into(),
        private_key: Some(DEV_KEY.into()),
        chain_id: CHAIN_ID,
        ..LedgerConfig::default()
    }
}

fn client_with(rpc: MemoryRpc) -> LedgerClient<MemoryRpc> {
    LedgerClient::new(rpc, &config()).unwrap()
}

fn client() -> LedgerClient<MemoryRpc> {
    client_with(MemoryRpc::new(CHAIN_ID).unwrap())
}

fn locator(s: &str) -> ContentLocator {
    ContentLocator::new(s).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_lookup() {
    let ledger = client();
    let fingerprint = Fingerprint::of(b"abc");

    assert!(!ledger.exists(&fingerprint).await.unwrap().exists);

    let receipt = ledger
        .submit_attestation(&fingerprint, &locator("cs-loc-1"))
        .await
        .unwrap();
    assert!(receipt.tx_hash.starts_with("0x"));
    assert_eq!(receipt.tx_hash.len(), 66);
    assert!(receipt.block_number > 0);

    let attestation = ledger.exists(&fingerprint).await.unwrap();
    assert!(attestation.exists);
    assert_eq!(attestation.content_locator, Some(locator("cs-loc-1")));
    assert_eq!(ledger.rpc().broadcast_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submission_uses_ledger_fee_estimate() {
    let ledger = client();
    let fees = FeeEstimate {
        base_fee: U256::from(50_000_000_000u64),
        priority_fee: U256::from(2_000_000_000u64),
    };
    ledger.rpc().set_fees(fees);

    assert_eq!(ledger.fee_estimate().await.unwrap(), fees);
    ledger
        .submit_attestation(&Fingerprint::of(b"abc"), &locator("cs-loc-1"))
        .await
        .unwrap();

    assert_eq!(ledger.rpc().broadcast_fee_caps(), vec![fees.base_fee]);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_balance_broadcasts_nothing() {
    let ledger = client();
    ledger.rpc().set_balance(U256::exp10(15)); // 0.001 < 0.03

    let err = ledger
        .submit_attestation(&Fingerprint::of(b"abc"), &locator("cs-loc-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert_eq!(ledger.rpc().broadcast_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_predicted_revert_is_not_broadcast() {
    let ledger = client();
    let fingerprint = Fingerprint::of(b"abc");
    ledger.rpc().attest(&fingerprint.to_hex(), "cs-loc-0");

    let err = ledger
        .submit_attestation(&fingerprint, &locator("cs-loc-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::TransactionWouldRevert(_)));
    assert_eq!(ledger.rpc().broadcast_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reverted_receipt() {
    let ledger = client();
    ledger.rpc().set_receipt_behavior(ReceiptBehavior::Revert);
    let fingerprint = Fingerprint::of(b"abc");

    let err = ledger
        .submit_attestation(&fingerprint, &locator("cs-loc-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AttestationReverted { .. }));
    assert!(!ledger.exists(&fingerprint).await.unwrap().exists);
}

#[tokio::test(start_paused = true)]
async fn test_missing_receipt_times_out() {
    let ledger = client();
    ledger.rpc().set_receipt_behavior(ReceiptBehavior::Never);

    let err = ledger
        .submit_attestation(&Fingerprint::of(b"abc"), &locator("cs-loc-1"))
        .await
        .unwrap_err();

    match err {
        LedgerError::ConfirmationTimeout { tx_hash } => assert!(tx_hash.starts_with("0x")),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(ledger.rpc().broadcast_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_broadcast_does_not_burn_nonce() {
    let ledger = client();
    ledger
        .rpc()
        .fail_next_broadcast(ChainError::Transport("connection reset".into()));

    let err = ledger
        .submit_attestation(&Fingerprint::of(b"a"), &locator("loc-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Transport(_)));

    ledger
        .submit_attestation(&Fingerprint::of(b"b"), &locator("loc-b"))
        .await
        .unwrap();
    assert_eq!(ledger.rpc().broadcast_nonces(), vec![U256::zero()]);
}

#[tokio::test(start_paused = true)]
async fn test_unmined_transactions_count_toward_pending_nonce() {
    let ledger = client();
    let signer = ledger.signer_address().unwrap();
    ledger.rpc().set_receipt_behavior(ReceiptBehavior::Never);

    for i in 0..3u8 {
        let err = ledger
            .submit_attestation(&Fingerprint::of(&[i]), &locator(&format!("loc-{}", i)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConfirmationTimeout { .. }));
    }

    assert_eq!(ledger.rpc().pending_nonce(signer).await.unwrap(), U256::from(3));
    let expected: Vec<U256> = (0..3u64).map(U256::from).collect();
    assert_eq!(ledger.rpc().broadcast_nonces(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_transaction_nonce_is_reused() {
    let ledger = client();
    let signer = ledger.signer_address().unwrap();
    ledger.rpc().set_receipt_behavior(ReceiptBehavior::Never);

    let err = ledger
        .submit_attestation(&Fingerprint::of(b"a"), &locator("loc-a"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ConfirmationTimeout { .. }));

    // The node evicts the stuck transaction.
    assert_eq!(ledger.rpc().drop_pending(), 1);
    assert_eq!(ledger.rpc().pending_nonce(signer).await.unwrap(), U256::zero());

    ledger.rpc().set_receipt_behavior(ReceiptBehavior::Success);
    ledger
        .submit_attestation(&Fingerprint::of(b"b"), &locator("loc-b"))
        .await
        .unwrap();

    assert_eq!(
        ledger.rpc().broadcast_nonces(),
        vec![U256::zero(), U256::zero()]
    );
    assert!(ledger.exists(&Fingerprint::of(b"b")).await.unwrap().exists);
    assert!(!ledger.exists(&Fingerprint::of(b"a")).await.unwrap().exists);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submissions_use_distinct_nonces() {
    let rpc = MemoryRpc::new(CHAIN_ID)
        .unwrap()
        .with_latency(Duration::from_millis(25));
    let ledger = Arc::new(client_with(rpc));

    let handles: Vec<_> = (0..5u8)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .submit_attestation(&Fingerprint::of(&[i]), &locator(&format!("loc-{}", i)))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut nonces = ledger.rpc().broadcast_nonces();
    nonces.sort();
    let expected: Vec<U256> = (0..5u64).map(U256::from).collect();
    assert_eq!(nonces, expected);
}

#[tokio::test]
async fn test_read_only_client_cannot_submit() {
    let config = LedgerConfig {
        private_key: None,
        ..config()
    };
    let ledger = LedgerClient::new(MemoryRpc::new(CHAIN_ID).unwrap(), &config).unwrap();

    assert!(ledger.signer_address().is_none());
    assert!(matches!(
        ledger
            .submit_attestation(&Fingerprint::of(b"abc"), &locator("cs-loc-1"))
            .await,
        Err(LedgerError::InvalidCredentials(_))
    ));
}

#[tokio::test]
async fn test_chain_id_check() {
    let ledger = LedgerClient::new(MemoryRpc::new(1).unwrap(), &config()).unwrap();
    assert!(ledger.check_chain().await.is_err());

    assert!(client().check_chain().await.is_ok());
}

#[test]
fn test_rejects_bad_config() {
    let bad_address = LedgerConfig {
        contract_address: "nope".into(),
        ..config()
    };
    assert!(matches!(
        LedgerClient::new(MemoryRpc::new(CHAIN_ID).unwrap(), &bad_address),
        Err(LedgerError::Config(_))
    ));

    let bad_key = LedgerConfig {
        private_key: Some("0x1234".into()),
        ..config()
    };
    assert!(matches!(
        LedgerClient::new(MemoryRpc::new(CHAIN_ID).unwrap(), &bad_key),
        Err(LedgerError::InvalidCredentials(_))
    ));
}
