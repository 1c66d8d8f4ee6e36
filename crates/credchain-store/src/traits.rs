//! CredentialStore trait: the abstract interface for the metadata cache.
//!
//! This trait keeps the coordinator storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use credchain_core::{ContentLocator, Credential, Fingerprint, PublicId};

use crate::error::Result;

/// Result of inserting a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// The credential and its metadata were committed.
    Inserted,
    /// A credential with the same fingerprint and the same ledger
    /// transaction already exists (idempotent retry, not an error).
    AlreadyExists {
        /// The record that was stored first.
        existing: Credential,
    },
    /// A credential with the same fingerprint but a different ledger
    /// transaction exists.
    Conflict {
        /// The record that holds the fingerprint.
        existing: Credential,
    },
    /// The ledger transaction is already bound to another fingerprint.
    ReferenceInUse {
        /// The record that holds the transaction.
        existing: Credential,
    },
}

/// The CredentialStore trait: async interface for the metadata cache.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **All-or-nothing**: `insert_credential` writes the credential row and
///   its descriptive metadata in one transaction; on any failure neither is
///   visible.
/// - **Uniqueness**: fingerprint, public id and ledger transaction are each
///   unique.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Write
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a confirmed credential.
    ///
    /// # Returns
    /// - `Inserted` if the credential was new.
    /// - `AlreadyExists` if the same fingerprint and ledger transaction are stored.
    /// - `Conflict` if the fingerprint is stored with a different transaction.
    /// - `ReferenceInUse` if the transaction is stored for another fingerprint.
    ///
    /// # Errors
    /// - `PublicIdTaken` if the public id collides with an existing record.
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a credential by its public identifier.
    async fn get_by_public_id(&self, public_id: &PublicId) -> Result<Option<Credential>>;

    /// Get a credential by document fingerprint.
    async fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<Credential>>;

    /// Resolve the fingerprint attested by a ledger transaction.
    async fn fingerprint_by_ledger_tx(&self, tx_hash: &str) -> Result<Option<Fingerprint>>;

    /// Resolve the fingerprint of an uploaded document.
    async fn fingerprint_by_content_locator(
        &self,
        locator: &ContentLocator,
    ) -> Result<Option<Fingerprint>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// List credentials, newest first.
    async fn list_credentials(&self, limit: Option<usize>) -> Result<Vec<Credential>>;

    /// Number of stored credentials.
    async fn count_credentials(&self) -> Result<u64>;
}

/// Classify an incoming credential against the record already holding its
/// fingerprint.
pub(crate) fn classify_existing(incoming: &Credential, existing: Credential) -> InsertResult {
    if existing
        .ledger_reference
        .same_transaction(&incoming.ledger_reference)
    {
        InsertResult::AlreadyExists { existing }
    } else {
        InsertResult::Conflict { existing }
    }
}
