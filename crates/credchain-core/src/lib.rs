//! # credchain Core
//!
//! Pure primitives for credchain: document fingerprints, credential
//! identifiers, and the credential record itself.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! deterministic computation over document bytes and record fields.
//!
//! ## Key Types
//!
//! - [`Fingerprint`] - SHA-256 of a document, the dedupe and identity key
//! - [`InternalId`] - Time-sortable storage key assigned at confirm-time
//! - [`PublicId`] - Short shareable identifier derived from [`InternalId`]
//! - [`ContentLocator`] - Opaque reference returned by the content store
//! - [`LedgerReference`] - Transaction hash and block of an attestation
//! - [`Credential`] - The confirmed, immutable issuance record
//!
//! ## Validation
//!
//! Descriptive metadata is checked before any external store is touched.
//! See [`validation`] module.

pub mod credential;
pub mod error;
pub mod fingerprint;
pub mod types;
pub mod validation;

pub use credential::{Credential, DescriptiveMetadata, UrlScheme};
pub use error::{CoreError, ValidationError};
pub use fingerprint::Fingerprint;
pub use types::{ContentLocator, InternalId, LedgerReference, PublicId, PUBLIC_ID_LEN};
pub use validation::{validate_metadata, validate_metadata_at};
