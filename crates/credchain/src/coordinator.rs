//! The Coordinator: issuance and verification across the three stores.
//!
//! Issuance is a saga over systems that share no transaction:
//!
//! ```text
//! prepare:  validate -> fingerprint -> ledger.exists -> precheck -> upload
//! attest:   ledger.submit_attestation          (server-signed mode only)
//! confirm:  validate -> ledger.exists (optional) -> cache insert
//! ```
//!
//! The ledger is the only dedupe gate. The cache is written last, once the
//! content store and the ledger are both committed, so it never records an
//! issuance that did not happen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use credchain_content::{ContentError, ContentStore, Tag};
use credchain_core::{
    validate_metadata, ContentLocator, Credential, DescriptiveMetadata, Fingerprint, InternalId,
    LedgerReference, PublicId, UrlScheme,
};
use credchain_ledger::{Ledger, LedgerReceipt};
use credchain_store::{CredentialStore, InsertResult, StoreError};

use crate::config::AttestationMode;
use crate::error::{CertifyError, Result};

/// Behavior switches for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub attestation_mode: AttestationMode,
    /// Re-read the ledger before persisting a confirmed issuance.
    pub verify_on_confirm: bool,
    /// `App-Name` tag on uploads.
    pub app_name: String,
    /// `Content-Type` tag on uploads.
    pub content_type: String,
    /// Attempts at finding a free public id before giving up.
    pub max_public_id_attempts: u32,
    pub urls: UrlScheme,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            attestation_mode: AttestationMode::External,
            verify_on_confirm: true,
            app_name: "DiplomaVerification".into(),
            content_type: "application/pdf".into(),
            max_public_id_attempts: 3,
            urls: UrlScheme::default(),
        }
    }
}

/// Outcome of a successful prepare: the document is uploaded but nothing
/// is attested or cached yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prepared {
    pub fingerprint: Fingerprint,
    pub content_locator: ContentLocator,
    pub content_url: String,
}

/// Everything confirm needs, as supplied by the caller.
///
/// Identifiers arrive as raw strings and are validated by confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub fingerprint: String,
    pub content_locator: String,
    pub ledger_tx_hash: String,
    #[serde(default)]
    pub ledger_block: u64,
    pub metadata: DescriptiveMetadata,
}

impl ConfirmRequest {
    /// Build a request from a prepare result and its attestation receipt.
    pub fn new(prepared: &Prepared, receipt: &LedgerReceipt, metadata: DescriptiveMetadata) -> Self {
        Self {
            fingerprint: prepared.fingerprint.to_hex(),
            content_locator: prepared.content_locator.to_string(),
            ledger_tx_hash: receipt.tx_hash.clone(),
            ledger_block: receipt.block_number,
            metadata,
        }
    }
}

/// Details of a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRecord {
    pub public_id: PublicId,
    pub fingerprint: Fingerprint,
    pub owner: String,
    pub university: String,
    /// `"{faculty} - {department}"`.
    pub degree: String,
    pub graduation_year: i32,
    /// `YYYY-MM-DD`.
    pub issue_date: String,
    pub content_locator: ContentLocator,
    pub content_url: String,
    pub ledger_reference: LedgerReference,
    pub ledger_url: String,
}

impl From<&Credential> for VerifiedRecord {
    fn from(credential: &Credential) -> Self {
        Self {
            public_id: credential.public_id.clone(),
            fingerprint: credential.fingerprint,
            owner: credential.owner.clone(),
            university: credential.metadata.university.clone(),
            degree: credential.metadata.degree(),
            graduation_year: credential.metadata.graduation_year,
            issue_date: credential.issue_date(),
            content_locator: credential.content_locator.clone(),
            content_url: credential.content_url.clone(),
            ledger_reference: credential.ledger_reference.clone(),
            ledger_url: credential.ledger_url.clone(),
        }
    }
}

/// Answer to a verification query. An unknown id is `verified = false`,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none", flatten)]
    pub record: Option<VerifiedRecord>,
}

impl VerificationResult {
    pub fn not_found() -> Self {
        Self {
            verified: false,
            record: None,
        }
    }

    pub fn found(credential: &Credential) -> Self {
        Self {
            verified: true,
            record: Some(VerifiedRecord::from(credential)),
        }
    }
}

/// Reconciled state of a document across the cache and the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Attested and cached.
    Issued(Credential),
    /// Attested on the ledger but missing from the cache; confirm can
    /// rebuild the record.
    AttestedUncached {
        fingerprint: Fingerprint,
        content_locator: Option<ContentLocator>,
    },
    /// Unknown to the ledger.
    Unknown { fingerprint: Fingerprint },
}

/// One line of the issuance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub public_id: PublicId,
    pub owner: String,
    pub department: String,
    /// Unix milliseconds.
    pub issued_at: i64,
    pub content_url: String,
}

impl From<Credential> for HistoryEntry {
    fn from(credential: Credential) -> Self {
        Self {
            public_id: credential.public_id,
            owner: credential.owner,
            department: credential.metadata.department,
            issued_at: credential.issued_at,
            content_url: credential.content_url,
        }
    }
}

/// The issuance coordinator.
///
/// Stateless between calls: prepare and confirm are correlated only by
/// `(fingerprint, ledger_reference)`. Cheap to clone; clones share the
/// same backends.
pub struct Coordinator<L: Ledger, C: ContentStore, S: CredentialStore> {
    ledger: Arc<L>,
    content: Arc<C>,
    store: Arc<S>,
    config: CoordinatorConfig,
}

impl<L: Ledger, C: ContentStore, S: CredentialStore> Clone for Coordinator<L, C, S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            content: self.content.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L: Ledger, C: ContentStore, S: CredentialStore> Coordinator<L, C, S> {
    pub fn new(ledger: L, content: C, store: S, config: CoordinatorConfig) -> Self {
        Self::from_shared(Arc::new(ledger), Arc::new(content), Arc::new(store), config)
    }

    /// Build over backends that are also used elsewhere.
    pub fn from_shared(
        ledger: Arc<L>,
        content: Arc<C>,
        store: Arc<S>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            ledger,
            content,
            store,
            config,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issuance
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate, dedupe against the ledger, and upload the document.
    ///
    /// Nothing is attested or cached. A failure after upload leaves an
    /// unreferenced blob behind, which is harmless.
    #[tracing::instrument(skip(self, document, metadata), fields(size = document.len()))]
    pub async fn prepare(
        &self,
        document: &[u8],
        metadata: &DescriptiveMetadata,
    ) -> Result<Prepared> {
        validate_metadata(metadata)?;
        if document.is_empty() {
            return Err(CertifyError::InvalidOperation("empty document".into()));
        }

        let fingerprint = Fingerprint::of(document);

        let attestation = self.ledger.exists(&fingerprint).await?;
        if attestation.exists {
            tracing::info!(%fingerprint, "document already attested");
            return Err(CertifyError::AlreadyIssued {
                fingerprint,
                existing_locator: attestation.content_locator,
            });
        }

        let estimate = self.content.precheck_cost(document.len()).await?;
        if !estimate.is_sufficient() {
            tracing::warn!(
                balance = estimate.balance,
                required = estimate.estimated_cost,
                "content store balance too low"
            );
            return Err(ContentError::InsufficientFunds(format!(
                "balance {}, required {}",
                estimate.balance, estimate.estimated_cost
            ))
            .into());
        }

        let content_locator = self
            .content
            .upload(document, &self.upload_tags(&fingerprint))
            .await?;
        let content_url = self.config.urls.content_url(&content_locator);

        tracing::info!(%fingerprint, locator = %content_locator, "document prepared");

        Ok(Prepared {
            fingerprint,
            content_locator,
            content_url,
        })
    }

    /// Attest a prepared document with the service's own key.
    #[tracing::instrument(skip(self, prepared), fields(fingerprint = %prepared.fingerprint))]
    pub async fn attest(&self, prepared: &Prepared) -> Result<LedgerReceipt> {
        if self.config.attestation_mode != AttestationMode::ServerSigned {
            return Err(CertifyError::InvalidOperation(
                "attestations are signed externally in this configuration".into(),
            ));
        }

        let receipt = self
            .ledger
            .submit_attestation(&prepared.fingerprint, &prepared.content_locator)
            .await?;

        tracing::info!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "document attested");
        Ok(receipt)
    }

    /// Persist a confirmed issuance and return the credential.
    ///
    /// Idempotent on `(fingerprint, ledger reference)`: repeating a confirm
    /// returns the credential stored the first time.
    #[tracing::instrument(skip(self, request), fields(fingerprint = %request.fingerprint))]
    pub async fn confirm(&self, request: ConfirmRequest) -> Result<Credential> {
        validate_metadata(&request.metadata)?;
        let fingerprint = Fingerprint::from_hex(&request.fingerprint)?;
        let locator = ContentLocator::new(request.content_locator.as_str())?;
        let reference = LedgerReference::new(&request.ledger_tx_hash, request.ledger_block)?;

        if self.config.verify_on_confirm {
            let attestation = self.ledger.exists(&fingerprint).await?;
            if !attestation.exists {
                return Err(CertifyError::AttestationNotFound { fingerprint });
            }
            if attestation.content_locator.as_ref() != Some(&locator) {
                return Err(CertifyError::LocatorMismatch {
                    fingerprint,
                    attested: attestation.content_locator,
                    supplied: locator,
                });
            }
        }

        let issued_at = now_millis();

        for attempt in 1..=self.config.max_public_id_attempts {
            let credential = Credential::new(
                InternalId::generate(),
                fingerprint,
                locator.clone(),
                reference.clone(),
                request.metadata.clone(),
                issued_at,
                &self.config.urls,
            );

            match self.store.insert_credential(&credential).await {
                Ok(InsertResult::Inserted) => {
                    tracing::info!(public_id = %credential.public_id, "credential issued");
                    return Ok(credential);
                }
                Ok(InsertResult::AlreadyExists { existing }) => {
                    tracing::info!(public_id = %existing.public_id, "confirm repeated, returning stored credential");
                    return Ok(existing);
                }
                Ok(InsertResult::Conflict { existing }) => {
                    tracing::warn!(
                        existing_tx = %existing.ledger_reference.tx_hash,
                        supplied_tx = %reference.tx_hash,
                        "fingerprint already issued under another transaction"
                    );
                    return Err(CertifyError::AlreadyIssued {
                        fingerprint,
                        existing_locator: Some(existing.content_locator),
                    });
                }
                Ok(InsertResult::ReferenceInUse { existing }) => {
                    return Err(CertifyError::ReferenceInUse {
                        ledger_reference: reference,
                        existing: existing.public_id,
                    });
                }
                Err(StoreError::PublicIdTaken(public_id)) => {
                    tracing::warn!(%public_id, attempt, "public id collision, regenerating");
                }
                Err(e) => {
                    tracing::error!(error = %e, "cache write failed");
                    return Err(CertifyError::CacheWrite {
                        fingerprint,
                        ledger_reference: reference,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(CertifyError::CacheWrite {
            fingerprint,
            ledger_reference: reference,
            reason: format!(
                "no free public id after {} attempts",
                self.config.max_public_id_attempts
            ),
        })
    }

    /// Prepare, attest and confirm in one call (server-signed mode only).
    #[tracing::instrument(skip(self, document, metadata), fields(size = document.len()))]
    pub async fn issue(
        &self,
        document: &[u8],
        metadata: DescriptiveMetadata,
    ) -> Result<Credential> {
        if self.config.attestation_mode != AttestationMode::ServerSigned {
            return Err(CertifyError::InvalidOperation(
                "attestations are signed externally in this configuration".into(),
            ));
        }

        let prepared = self.prepare(document, &metadata).await?;
        let receipt = self.attest(&prepared).await?;
        self.confirm(ConfirmRequest::new(&prepared, &receipt, metadata))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a credential by public id. Cache only.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, public_id: &str) -> Result<VerificationResult> {
        let Ok(public_id) = PublicId::parse(public_id) else {
            tracing::debug!("malformed public id");
            return Ok(VerificationResult::not_found());
        };

        Ok(match self.store.get_by_public_id(&public_id).await? {
            Some(credential) => VerificationResult::found(&credential),
            None => VerificationResult::not_found(),
        })
    }

    /// Reconcile a document against the cache and the ledger.
    #[tracing::instrument(skip(self, document), fields(size = document.len()))]
    pub async fn check_document(&self, document: &[u8]) -> Result<DocumentStatus> {
        let fingerprint = Fingerprint::of(document);

        if let Some(credential) = self.store.get_by_fingerprint(&fingerprint).await? {
            return Ok(DocumentStatus::Issued(credential));
        }

        let attestation = self.ledger.exists(&fingerprint).await?;
        if attestation.exists {
            tracing::warn!(%fingerprint, "attested document missing from cache");
            return Ok(DocumentStatus::AttestedUncached {
                fingerprint,
                content_locator: attestation.content_locator,
            });
        }

        Ok(DocumentStatus::Unknown { fingerprint })
    }

    /// Resolve a fingerprint from a ledger transaction or a content
    /// locator. The ledger reference is tried first.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_fingerprint(
        &self,
        ledger_tx_hash: Option<&str>,
        content_locator: Option<&str>,
    ) -> Result<Option<Fingerprint>> {
        if let Some(tx) = ledger_tx_hash.map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(fingerprint) = self.store.fingerprint_by_ledger_tx(tx).await? {
                return Ok(Some(fingerprint));
            }
            tracing::debug!(tx, "ledger reference not found");
        }

        if let Some(locator) = content_locator.and_then(|l| ContentLocator::new(l).ok()) {
            if let Some(fingerprint) = self.store.fingerprint_by_content_locator(&locator).await? {
                return Ok(Some(fingerprint));
            }
            tracing::debug!(%locator, "content locator not found");
        }

        Ok(None)
    }

    /// Retrieval URL of a credential's document.
    pub async fn content_url(&self, public_id: &str) -> Result<Option<String>> {
        let Ok(public_id) = PublicId::parse(public_id) else {
            return Ok(None);
        };
        Ok(self
            .store
            .get_by_public_id(&public_id)
            .await?
            .map(|c| c.content_url))
    }

    /// Issued credentials, newest first.
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .store
            .list_credentials(limit)
            .await?
            .into_iter()
            .map(HistoryEntry::from)
            .collect())
    }

    fn upload_tags(&self, fingerprint: &Fingerprint) -> Vec<Tag> {
        vec![
            Tag::new("Content-Type", &self.config.content_type),
            Tag::new("App-Name", &self.config.app_name),
            Tag::new("File-Hash", fingerprint.to_hex()),
            Tag::new("Timestamp", now_millis().to_string()),
        ]
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
