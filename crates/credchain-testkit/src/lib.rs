//! # credchain Testkit
//!
//! Testing utilities for credchain.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known fingerprints and public ids that every build must reproduce
//! - **Generators**: Proptest strategies for metadata, documents and references
//! - **Fixtures**: A coordinator wired to in-memory backends, with handles to each
//!
//! ## Test Fixtures
//!
//! ```rust
//! use credchain_testkit::fixtures::{sample_document, sample_metadata, TestFixture};
//!
//! # async fn example() {
//! let fixture = TestFixture::server_signed();
//! let credential = fixture
//!     .coordinator
//!     .issue(&sample_document(1), sample_metadata())
//!     .await
//!     .unwrap();
//! assert_eq!(fixture.ledger.submission_count(), 1);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use credchain_testkit::generators::{document, metadata};
//!
//! proptest! {
//!     #[test]
//!     fn generated_metadata_is_valid(m in metadata()) {
//!         prop_assert!(credchain_core::validate_metadata(&m).is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{sample_document, sample_metadata, MemoryCoordinator, TestFixture};
pub use generators::{document, metadata, random_document, tx_hash};
pub use vectors::{
    fingerprint_vectors, public_id_vectors, verify_all_vectors, FingerprintVector, PublicIdVector,
};
