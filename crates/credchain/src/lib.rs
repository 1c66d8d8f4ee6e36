//! # credchain
//!
//! Issues tamper-evident academic credentials and verifies them.
//!
//! ## Overview
//!
//! A credential document is held in three places that share no transaction:
//!
//! - **Content store**: the document bytes, addressed by a [`ContentLocator`]
//! - **Ledger**: an attestation binding the document's [`Fingerprint`] to
//!   that locator, referenced by a [`LedgerReference`]
//! - **Metadata cache**: the [`Credential`] record, looked up by [`PublicId`]
//!
//! The [`Coordinator`] drives issuance as `prepare -> attest -> confirm`.
//! The ledger is the only dedupe authority; the cache is written last.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use credchain::{CertifyConfig, ConfirmRequest};
//! use credchain::core::DescriptiveMetadata;
//!
//! async fn example(document: Vec<u8>, metadata: DescriptiveMetadata) -> anyhow::Result<()> {
//!     let coordinator = CertifyConfig::from_env()?.build()?;
//!
//!     // Upload and dedupe; nothing is committed yet.
//!     let prepared = coordinator.prepare(&document, &metadata).await?;
//!
//!     // Server-signed deployments attest here; otherwise a client wallet
//!     // signs and hands back the receipt.
//!     let receipt = coordinator.attest(&prepared).await?;
//!
//!     let credential = coordinator
//!         .confirm(ConfirmRequest::new(&prepared, &receipt, metadata))
//!         .await?;
//!
//!     let result = coordinator.verify(credential.public_id.as_str()).await?;
//!     assert!(result.verified);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `credchain::core` - Fingerprints, identifiers, the credential record
//! - `credchain::store` - Metadata cache (SQLite and in-memory)
//! - `credchain::content` - Content store clients
//! - `credchain::ledger` - Ledger attestation clients

pub mod config;
pub mod coordinator;
pub mod error;

// Re-export component crates
pub use credchain_content as content;
pub use credchain_core as core;
pub use credchain_ledger as ledger;
pub use credchain_store as store;

// Re-export main types for convenience
pub use config::{AttestationMode, CertifyConfig, LiveCoordinator, StoreConfig};
pub use coordinator::{
    ConfirmRequest, Coordinator, CoordinatorConfig, DocumentStatus, HistoryEntry, Prepared,
    VerificationResult, VerifiedRecord,
};
pub use error::{CertifyError, ErrorKind, Result};

pub use credchain_core::{
    ContentLocator, Credential, DescriptiveMetadata, Fingerprint, InternalId, LedgerReference,
    PublicId,
};
