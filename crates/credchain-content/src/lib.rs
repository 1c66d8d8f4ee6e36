//! # credchain Content
//!
//! Client for the permanent content store that holds the issued documents.
//! Uploads are write-once: nothing here ever updates or deletes a blob.
//!
//! ## Key Types
//!
//! - [`ContentStore`] - The async trait the coordinator consumes
//! - [`HttpContentStore`] - Gateway + bundler client over HTTP
//! - [`MemoryContentStore`] - Deterministic fake with fault injection
//! - [`CostEstimate`] - Balance and price for an upload of a given size
//! - [`Tag`] - Name/value pair attached to an upload
//!
//! ## Error Semantics
//!
//! A failed balance or price query is a [`ContentError::Transport`], never
//! [`ContentError::InsufficientFunds`]. No call retries internally.

pub mod error;
pub mod http;
pub mod memory;
pub mod traits;

pub use error::{ContentError, Result};
pub use http::{ContentConfig, HttpContentStore};
pub use memory::{MemoryContentStore, StoredBlob};
pub use traits::{ContentStore, CostEstimate, Tag};
