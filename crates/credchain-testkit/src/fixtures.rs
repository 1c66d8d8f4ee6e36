//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use credchain::{AttestationMode, ConfirmRequest, Coordinator, CoordinatorConfig, Prepared};
use credchain_content::MemoryContentStore;
use credchain_core::{DescriptiveMetadata, LedgerReference};
use credchain_ledger::MemoryLedger;
use credchain_store::MemoryStore;

/// A coordinator over the in-memory backends.
pub type MemoryCoordinator = Coordinator<MemoryLedger, MemoryContentStore, MemoryStore>;

/// A coordinator plus shared handles to its backends, for fault injection
/// and inspection.
pub struct TestFixture {
    pub ledger: Arc<MemoryLedger>,
    pub content: Arc<MemoryContentStore>,
    pub store: Arc<MemoryStore>,
    pub coordinator: MemoryCoordinator,
}

impl TestFixture {
    /// External signing, ledger re-read on confirm.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// The service signs attestations itself.
    pub fn server_signed() -> Self {
        Self::with_config(CoordinatorConfig {
            attestation_mode: AttestationMode::ServerSigned,
            ..CoordinatorConfig::default()
        })
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let content = Arc::new(MemoryContentStore::new());
        let store = Arc::new(MemoryStore::new());
        let coordinator =
            Coordinator::from_shared(ledger.clone(), content.clone(), store.clone(), config);

        Self {
            ledger,
            content,
            store,
            coordinator,
        }
    }

    /// Play the client wallet: record an attestation for a prepared
    /// document as if it had been signed outside the service.
    pub fn attest_externally(&self, prepared: &Prepared, tx_hash: &str, block: u64) -> LedgerReference {
        let reference = LedgerReference::new(tx_hash, block)
            .unwrap_or_else(|e| panic!("bad test tx hash {:?}: {}", tx_hash, e));
        self.ledger.attest_external(
            prepared.fingerprint,
            prepared.content_locator.clone(),
            reference.clone(),
        );
        reference
    }

    /// Build the confirm request for a prepared, externally attested document.
    pub fn confirm_request(
        &self,
        prepared: &Prepared,
        reference: &LedgerReference,
        metadata: DescriptiveMetadata,
    ) -> ConfirmRequest {
        ConfirmRequest::new(prepared, reference, metadata)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Valid metadata for a fictional graduate.
pub fn sample_metadata() -> DescriptiveMetadata {
    metadata_for("Ada", "Lovelace")
}

/// Valid metadata with the given holder name.
pub fn metadata_for(first_name: &str, last_name: &str) -> DescriptiveMetadata {
    DescriptiveMetadata {
        first_name: first_name.into(),
        last_name: last_name.into(),
        email: format!(
            "{}.{}@example.edu",
            first_name.to_lowercase(),
            last_name.to_lowercase()
        ),
        university: "Example University".into(),
        faculty: "Engineering".into(),
        department: "Computer Science".into(),
        graduation_year: 2024,
        student_number: "20240001".into(),
        nationality: "GB".into(),
    }
}

/// A small PDF-looking document; distinct `n` give distinct fingerprints.
pub fn sample_document(n: u32) -> Vec<u8> {
    format!("%PDF-1.7\n% diploma #{}\n%%EOF\n", n).into_bytes()
}
