//! ContentStore trait and its value types.

use async_trait::async_trait;
use credchain_core::ContentLocator;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Name/value pair attached to an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Balance and price for a prospective upload, both in the store's
/// smallest unit (winston for Arweave).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEstimate {
    pub balance: u128,
    pub estimated_cost: u128,
}

impl CostEstimate {
    /// Whether the balance covers the estimated cost.
    pub fn is_sufficient(&self) -> bool {
        self.balance >= self.estimated_cost
    }
}

/// The ContentStore trait: permanent, write-once document storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Query balance and price for an upload of `size` bytes.
    ///
    /// Never mutates anything.
    async fn precheck_cost(&self, size: usize) -> Result<CostEstimate>;

    /// Upload `data` with the given tags and return its locator.
    ///
    /// Not idempotent: uploading the same bytes twice yields two blobs.
    async fn upload(&self, data: &[u8], tags: &[Tag]) -> Result<ContentLocator>;
}
