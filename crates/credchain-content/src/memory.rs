//! In-memory implementation of the ContentStore trait.
//!
//! Deterministic: locators are `mem-{n}` in upload order, the price is a
//! fixed amount per byte, and every upload is paid from a settable balance.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use credchain_core::ContentLocator;

use crate::error::{ContentError, Result};
use crate::traits::{ContentStore, CostEstimate, Tag};

/// Default balance of a fresh store.
const DEFAULT_BALANCE: u128 = 1_000_000_000_000;

/// A stored blob with its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub tags: Vec<Tag>,
}

impl StoredBlob {
    /// Value of the first tag with the given name.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

struct Inner {
    blobs: HashMap<String, StoredBlob>,
    balance: u128,
    price_per_byte: u128,
    next_id: u64,
    precheck_fault: Option<ContentError>,
    upload_fault: Option<ContentError>,
}

/// In-memory content store.
pub struct MemoryContentStore {
    inner: Mutex<Inner>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                blobs: HashMap::new(),
                balance: DEFAULT_BALANCE,
                price_per_byte: 1,
                next_id: 1,
                precheck_fault: None,
                upload_fault: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| ContentError::Transport(format!("lock poisoned: {}", e)))
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Option<T> {
        self.lock().ok().map(|mut inner| f(&mut inner))
    }

    /// Set the wallet balance.
    pub fn set_balance(&self, balance: u128) {
        self.with_inner(|inner| inner.balance = balance);
    }

    /// Current wallet balance.
    pub fn balance(&self) -> u128 {
        self.with_inner(|inner| inner.balance).unwrap_or_default()
    }

    /// Set the price charged per uploaded byte.
    pub fn set_price_per_byte(&self, price: u128) {
        self.with_inner(|inner| inner.price_per_byte = price);
    }

    /// Make the next `precheck_cost` fail with `err`.
    pub fn fail_next_precheck(&self, err: ContentError) {
        self.with_inner(|inner| inner.precheck_fault = Some(err));
    }

    /// Make the next `upload` fail with `err`.
    pub fn fail_next_upload(&self, err: ContentError) {
        self.with_inner(|inner| inner.upload_fault = Some(err));
    }

    /// Number of blobs stored so far.
    pub fn upload_count(&self) -> usize {
        self.with_inner(|inner| inner.blobs.len()).unwrap_or_default()
    }

    /// Fetch a stored blob.
    pub fn get(&self, locator: &ContentLocator) -> Option<StoredBlob> {
        self.with_inner(|inner| inner.blobs.get(locator.as_str()).cloned())
            .flatten()
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn precheck_cost(&self, size: usize) -> Result<CostEstimate> {
        let mut inner = self.lock()?;

        if let Some(err) = inner.precheck_fault.take() {
            return Err(err);
        }

        Ok(CostEstimate {
            balance: inner.balance,
            estimated_cost: inner.price_per_byte * size as u128,
        })
    }

    async fn upload(&self, data: &[u8], tags: &[Tag]) -> Result<ContentLocator> {
        let mut inner = self.lock()?;

        if let Some(err) = inner.upload_fault.take() {
            return Err(err);
        }

        let cost = inner.price_per_byte * data.len() as u128;
        if inner.balance < cost {
            return Err(ContentError::InsufficientFunds(format!(
                "balance {}, required {}",
                inner.balance, cost
            )));
        }
        inner.balance -= cost;

        let id = format!("mem-{}", inner.next_id);
        inner.next_id += 1;
        inner.blobs.insert(
            id.clone(),
            StoredBlob {
                data: data.to_vec(),
                tags: tags.to_vec(),
            },
        );

        ContentLocator::new(id).map_err(|e| ContentError::UploadRejected(e.to_string()))
    }
}
