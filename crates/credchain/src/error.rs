//! Error types for issuance and verification.

use credchain_content::ContentError;
use credchain_core::{ContentLocator, CoreError, Fingerprint, LedgerReference, PublicId, ValidationError};
use credchain_ledger::LedgerError;
use credchain_store::StoreError;
use thiserror::Error;

/// How a caller should react to a [`CertifyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The document is already issued.
    Conflict,
    /// An account must be topped up before retrying.
    Precondition,
    /// The request was rejected before any store was touched.
    Invalid,
    /// The attempt failed; the fingerprint stays un-attested.
    Fatal,
    /// Outcome unknown; re-query the ledger before retrying.
    Ambiguous,
    /// Transient; retry with backoff.
    Retryable,
    /// The ledger does not (yet) know the fingerprint.
    NotFound,
}

/// Errors that can occur during coordinator operations.
#[derive(Debug, Error)]
pub enum CertifyError {
    /// Descriptive metadata failed validation.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] ValidationError),

    /// A fingerprint, locator or transaction hash is malformed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] CoreError),

    /// The operation is not allowed in the current configuration.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The fingerprint is already attested.
    #[error("document {fingerprint} already issued")]
    AlreadyIssued {
        fingerprint: Fingerprint,
        existing_locator: Option<ContentLocator>,
    },

    /// The ledger has no attestation for the fingerprint.
    #[error("no ledger attestation for {fingerprint}")]
    AttestationNotFound { fingerprint: Fingerprint },

    /// The ledger attests the fingerprint with a different locator.
    #[error("ledger attests {fingerprint} with locator {attested:?}, not {supplied}")]
    LocatorMismatch {
        fingerprint: Fingerprint,
        attested: Option<ContentLocator>,
        supplied: ContentLocator,
    },

    /// The ledger transaction is already recorded for another credential.
    #[error("ledger transaction {} already recorded for {existing}", .ledger_reference.tx_hash)]
    ReferenceInUse {
        ledger_reference: LedgerReference,
        existing: PublicId,
    },

    /// Persisting a confirmed issuance failed and was rolled back.
    #[error("cache write failed for {fingerprint} ({ledger_reference}): {reason}")]
    CacheWrite {
        fingerprint: Fingerprint,
        ledger_reference: LedgerReference,
        reason: String,
    },

    /// Content store error.
    #[error("content store: {0}")]
    Content(#[from] ContentError),

    /// Ledger error.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// Metadata cache error outside of a confirm write.
    #[error("cache: {0}")]
    Store(#[from] StoreError),
}

impl CertifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CertifyError::InvalidMetadata(_)
            | CertifyError::InvalidIdentifier(_)
            | CertifyError::InvalidOperation(_)
            | CertifyError::ReferenceInUse { .. } => ErrorKind::Invalid,

            CertifyError::AlreadyIssued { .. } => ErrorKind::Conflict,
            CertifyError::AttestationNotFound { .. } => ErrorKind::NotFound,
            CertifyError::LocatorMismatch { .. } => ErrorKind::Fatal,
            CertifyError::CacheWrite { .. } => ErrorKind::Retryable,

            CertifyError::Content(err) => match err {
                ContentError::InsufficientFunds(_) => ErrorKind::Precondition,
                ContentError::Transport(_) => ErrorKind::Retryable,
                ContentError::UploadRejected(_) => ErrorKind::Fatal,
            },

            CertifyError::Ledger(err) => match err {
                LedgerError::InsufficientBalance { .. } => ErrorKind::Precondition,
                LedgerError::ConfirmationTimeout { .. } => ErrorKind::Ambiguous,
                LedgerError::Transport(_) => ErrorKind::Retryable,
                LedgerError::TransactionWouldRevert(_)
                | LedgerError::AttestationReverted { .. }
                | LedgerError::InvalidCredentials(_)
                | LedgerError::Config(_)
                | LedgerError::Abi(_) => ErrorKind::Fatal,
            },

            CertifyError::Store(err) => match err {
                StoreError::InvalidData(_) | StoreError::Migration(_) => ErrorKind::Fatal,
                _ => ErrorKind::Retryable,
            },
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CertifyError>;
