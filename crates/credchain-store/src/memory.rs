//! In-memory implementation of the CredentialStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use credchain_core::{ContentLocator, Credential, Fingerprint, InternalId, PublicId};

use crate::error::{Result, StoreError};
use crate::traits::{classify_existing, CredentialStore, InsertResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,

    /// Number of upcoming writes that fail with `WriteFailed`.
    failing_writes: AtomicUsize,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Credentials indexed by internal id.
    credentials: HashMap<InternalId, Credential>,

    /// fingerprint -> internal id
    by_fingerprint: HashMap<Fingerprint, InternalId>,

    /// public id -> internal id
    by_public_id: HashMap<PublicId, InternalId>,

    /// ledger tx hash (lowercase) -> internal id
    by_ledger_tx: HashMap<String, InternalId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            failing_writes: AtomicUsize::new(0),
        }
    }

    /// Make the next insert fail with `StoreError::WriteFailed`, leaving the
    /// store untouched.
    pub fn fail_next_write(&self) {
        self.fail_next_writes(1);
    }

    /// Make the next `count` inserts fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn lookup(&self, id: Option<&InternalId>) -> Option<Credential> {
        id.and_then(|id| self.credentials.get(id)).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.lookup(inner.by_fingerprint.get(&credential.fingerprint)) {
            return Ok(classify_existing(credential, existing));
        }

        let tx_key = credential.ledger_reference.tx_hash.to_ascii_lowercase();
        if let Some(existing) = inner.lookup(inner.by_ledger_tx.get(&tx_key)) {
            return Ok(InsertResult::ReferenceInUse { existing });
        }

        if inner.by_public_id.contains_key(&credential.public_id) {
            return Err(StoreError::PublicIdTaken(credential.public_id.to_string()));
        }

        if self.take_injected_failure() {
            return Err(StoreError::WriteFailed("injected write failure".into()));
        }

        let id = credential.internal_id;
        inner.by_fingerprint.insert(credential.fingerprint, id);
        inner.by_public_id.insert(credential.public_id.clone(), id);
        inner.by_ledger_tx.insert(tx_key, id);
        inner.credentials.insert(id, credential.clone());

        Ok(InsertResult::Inserted)
    }

    async fn get_by_public_id(&self, public_id: &PublicId) -> Result<Option<Credential>> {
        let inner = self.read()?;
        Ok(inner.lookup(inner.by_public_id.get(public_id)))
    }

    async fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<Credential>> {
        let inner = self.read()?;
        Ok(inner.lookup(inner.by_fingerprint.get(fingerprint)))
    }

    async fn fingerprint_by_ledger_tx(&self, tx_hash: &str) -> Result<Option<Fingerprint>> {
        let inner = self.read()?;
        let key = tx_hash.trim().to_ascii_lowercase();
        Ok(inner
            .lookup(inner.by_ledger_tx.get(&key))
            .map(|c| c.fingerprint))
    }

    async fn fingerprint_by_content_locator(
        &self,
        locator: &ContentLocator,
    ) -> Result<Option<Fingerprint>> {
        let inner = self.read()?;
        Ok(inner
            .credentials
            .values()
            .find(|c| &c.content_locator == locator)
            .map(|c| c.fingerprint))
    }

    async fn list_credentials(&self, limit: Option<usize>) -> Result<Vec<Credential>> {
        let inner = self.read()?;

        let mut all: Vec<Credential> = inner.credentials.values().cloned().collect();
        all.sort_by(|a, b| {
            b.issued_at
                .cmp(&a.issued_at)
                .then_with(|| b.internal_id.cmp(&a.internal_id))
        });

        if let Some(limit) = limit {
            all.truncate(limit);
        }

        Ok(all)
    }

    async fn count_credentials(&self) -> Result<u64> {
        Ok(self.read()?.credentials.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credchain_core::{DescriptiveMetadata, LedgerReference, UrlScheme};
    use proptest::prelude::*;

    fn make_credential(document: &[u8], tx_hash: &str, issued_at: i64) -> Credential {
        Credential::new(
            InternalId::generate(),
            Fingerprint::of(document),
            ContentLocator::new(format!("loc-{}", tx_hash)).unwrap(),
            LedgerReference::new(tx_hash, 7).unwrap(),
            DescriptiveMetadata {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: "jane@example.edu".into(),
                university: "Example University".into(),
                department: "Physics".into(),
                graduation_year: 2022,
                ..Default::default()
            },
            issued_at,
            &UrlScheme::default(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        let credential = make_credential(b"doc", "0xaa", 1);

        assert_eq!(
            store.insert_credential(&credential).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.get_by_public_id(&credential.public_id).await.unwrap(),
            Some(credential.clone())
        );
        assert_eq!(
            store.fingerprint_by_ledger_tx("0xAA").await.unwrap(),
            Some(credential.fingerprint)
        );
        assert_eq!(
            store
                .fingerprint_by_content_locator(&credential.content_locator)
                .await
                .unwrap(),
            Some(credential.fingerprint)
        );
    }

    #[tokio::test]
    async fn test_duplicate_classification() {
        let store = MemoryStore::new();
        let first = make_credential(b"doc", "0xaa", 1);
        store.insert_credential(&first).await.unwrap();

        let retry = make_credential(b"doc", "0xaa", 2);
        assert_eq!(
            store.insert_credential(&retry).await.unwrap(),
            InsertResult::AlreadyExists {
                existing: first.clone()
            }
        );

        let conflicting = make_credential(b"doc", "0xbb", 3);
        assert_eq!(
            store.insert_credential(&conflicting).await.unwrap(),
            InsertResult::Conflict {
                existing: first.clone()
            }
        );

        let reused = make_credential(b"other", "0xaa", 4);
        assert_eq!(
            store.insert_credential(&reused).await.unwrap(),
            InsertResult::ReferenceInUse { existing: first }
        );

        assert_eq!(store.count_credentials().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let credential = make_credential(b"doc", "0xaa", 1);

        store.fail_next_write();
        assert!(matches!(
            store.insert_credential(&credential).await,
            Err(StoreError::WriteFailed(_))
        ));
        assert_eq!(store.count_credentials().await.unwrap(), 0);
        assert!(store
            .get_by_fingerprint(&credential.fingerprint)
            .await
            .unwrap()
            .is_none());

        // The fault is consumed; the retry succeeds.
        assert_eq!(
            store.insert_credential(&credential).await.unwrap(),
            InsertResult::Inserted
        );
    }

    #[tokio::test]
    async fn test_public_id_taken() {
        let store = MemoryStore::new();
        let first = make_credential(b"a", "0x01", 1);
        store.insert_credential(&first).await.unwrap();

        let mut clash = make_credential(b"b", "0x02", 2);
        clash.public_id = first.public_id.clone();
        assert!(matches!(
            store.insert_credential(&clash).await,
            Err(StoreError::PublicIdTaken(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_one_record_per_fingerprint(docs in prop::collection::vec(0u8..4, 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                for (i, doc) in docs.iter().enumerate() {
                    let credential = make_credential(&[*doc], &format!("0x{:04x}", i), i as i64);
                    store.insert_credential(&credential).await.unwrap();
                }

                let mut distinct = docs.clone();
                distinct.sort();
                distinct.dedup();
                assert_eq!(
                    store.count_credentials().await.unwrap(),
                    distinct.len() as u64
                );
            });
        }
    }
}
