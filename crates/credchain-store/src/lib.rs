//! # credchain Store
//!
//! The metadata cache: a durable, queryable record of every confirmed
//! issuance. It mirrors the union of the content store and the ledger and is
//! never the source of truth; everything in it can be rebuilt from those two.
//!
//! ## Key Types
//!
//! - [`CredentialStore`] - The async trait for all cache operations
//! - [`SqliteStore`] - SQLite-based persistent cache
//! - [`MemoryStore`] - In-memory cache for tests, with write fault injection
//! - [`InsertResult`] - Outcome of inserting a credential
//!
//! ## Usage
//!
//! ```rust,no_run
//! use credchain_store::{CredentialStore, SqliteStore};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("credentials.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let recent = store.list_credentials(Some(20)).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic writes**: the credential row and its metadata row commit together
//! - **Idempotent inserts**: same fingerprint with the same ledger transaction
//!   returns `AlreadyExists` carrying the stored record
//! - **One record per fingerprint**: same fingerprint with a different ledger
//!   transaction returns `Conflict`
//! - **Append-only**: there is no update or delete

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CredentialStore, InsertResult};
