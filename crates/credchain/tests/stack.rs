//! The coordinator over the production ledger client and SQLite cache, with
//! only the chain and the content store scripted.

use ethers::types::U256;
use proptest::prelude::*;

use credchain::content::MemoryContentStore;
use credchain::ledger::rpc::memory::MemoryRpc;
use credchain::ledger::{LedgerClient, LedgerConfig, LedgerError};
use credchain::store::{CredentialStore, SqliteStore};
use credchain::{AttestationMode, CertifyError, Coordinator, CoordinatorConfig, ErrorKind};
use credchain_testkit::fixtures::{sample_document, sample_metadata};
use credchain_testkit::generators::{document, metadata};

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const CHAIN_ID: u64 = 80002;

type StackCoordinator = Coordinator<LedgerClient<MemoryRpc>, MemoryContentStore, SqliteStore>;

fn ledger() -> LedgerClient<MemoryRpc> {
    let config = LedgerConfig {
        contract_address: CONTRACT.into(),
        private_key: Some(DEV_KEY.into()),
        chain_id: CHAIN_ID,
        ..LedgerConfig::default()
    };
    LedgerClient::new(MemoryRpc::new(CHAIN_ID).unwrap(), &config).unwrap()
}

fn coordinator(store: SqliteStore) -> StackCoordinator {
    Coordinator::new(
        ledger(),
        MemoryContentStore::new(),
        store,
        CoordinatorConfig {
            attestation_mode: AttestationMode::ServerSigned,
            ..CoordinatorConfig::default()
        },
    )
}

#[tokio::test]
async fn test_issue_and_verify_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.db");

    let credential = {
        let coordinator = coordinator(SqliteStore::open(&path).unwrap());
        let credential = coordinator
            .issue(&sample_document(1), sample_metadata())
            .await
            .unwrap();

        assert_eq!(credential.ledger_reference.tx_hash.len(), 66);
        assert_eq!(coordinator.ledger().rpc().broadcast_count(), 1);
        credential
    };

    let coordinator = coordinator(SqliteStore::open(&path).unwrap());
    let result = coordinator
        .verify(credential.public_id.as_str())
        .await
        .unwrap();
    assert!(result.verified);

    let stored = coordinator
        .store()
        .get_by_public_id(&credential.public_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, credential);
}

#[tokio::test]
async fn test_insufficient_balance_broadcasts_nothing() {
    let coordinator = coordinator(SqliteStore::open_memory().unwrap());
    coordinator.ledger().rpc().set_balance(U256::exp10(15));

    let err = coordinator
        .issue(&sample_document(1), sample_metadata())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CertifyError::Ledger(LedgerError::InsufficientBalance { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(coordinator.ledger().rpc().broadcast_count(), 0);
    assert_eq!(coordinator.store().count_credentials().await.unwrap(), 0);
}

#[tokio::test]
async fn test_chain_dedupe_gate() {
    let coordinator = coordinator(SqliteStore::open_memory().unwrap());

    coordinator
        .issue(&sample_document(1), sample_metadata())
        .await
        .unwrap();
    let err = coordinator
        .prepare(&sample_document(1), &sample_metadata())
        .await
        .unwrap_err();

    match err {
        CertifyError::AlreadyIssued {
            existing_locator, ..
        } => assert!(existing_locator.is_some()),
        other => panic!("expected AlreadyIssued, got {:?}", other),
    }
    assert_eq!(coordinator.ledger().rpc().broadcast_count(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_verify_returns_what_confirm_persisted(doc in document(256), meta in metadata()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let coordinator = coordinator(SqliteStore::open_memory().unwrap());
            let credential = coordinator.issue(&doc, meta.clone()).await.unwrap();

            let record = coordinator
                .verify(credential.public_id.as_str())
                .await
                .unwrap()
                .record
                .unwrap();

            assert_eq!(record.fingerprint, credential.fingerprint);
            assert_eq!(record.owner, meta.owner_name());
            assert_eq!(record.graduation_year, meta.graduation_year);
            assert_eq!(record.ledger_reference, credential.ledger_reference);
            assert_eq!(record.content_url, credential.content_url);
        });
    }
}
