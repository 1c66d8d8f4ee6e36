//! In-memory implementation of the Ledger trait.
//!
//! A high-level fake for coordinator tests: attestations land instantly,
//! transaction hashes are sequential, and each failure mode can be injected.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ethers::types::U256;

use credchain_core::{ContentLocator, Fingerprint, LedgerReference};

use crate::error::{LedgerError, Result};
use crate::traits::{Attestation, FeeEstimate, Ledger, LedgerReceipt};

struct Inner {
    attestations: HashMap<Fingerprint, (ContentLocator, LedgerReference)>,
    next_block: u64,
    next_tx: u64,
    submissions: usize,
    exists_fault: Option<LedgerError>,
    submit_fault: Option<LedgerError>,
}

/// In-memory ledger.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                attestations: HashMap::new(),
                next_block: 100,
                next_tx: 1,
                submissions: 0,
                exists_fault: None,
                submit_fault: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| LedgerError::Transport(format!("lock poisoned: {}", e)))
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Option<T> {
        self.lock().ok().map(|mut inner| f(&mut inner))
    }

    /// Record an attestation made outside this process, e.g. by a client
    /// wallet signing the transaction itself.
    pub fn attest_external(
        &self,
        fingerprint: Fingerprint,
        locator: ContentLocator,
        reference: LedgerReference,
    ) {
        self.with_inner(|inner| {
            inner.attestations.insert(fingerprint, (locator, reference));
        });
    }

    /// Make the next `exists` call fail with `err`.
    pub fn fail_next_exists(&self, err: LedgerError) {
        self.with_inner(|inner| inner.exists_fault = Some(err));
    }

    /// Make the next `submit_attestation` fail with `err`.
    pub fn fail_next_submit(&self, err: LedgerError) {
        self.with_inner(|inner| inner.submit_fault = Some(err));
    }

    /// Number of successful submissions.
    pub fn submission_count(&self) -> usize {
        self.with_inner(|inner| inner.submissions).unwrap_or_default()
    }

    /// Reference recorded for a fingerprint.
    pub fn reference_of(&self, fingerprint: &Fingerprint) -> Option<LedgerReference> {
        self.with_inner(|inner| inner.attestations.get(fingerprint).map(|(_, r)| r.clone()))
            .flatten()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<Attestation> {
        let mut inner = self.lock()?;

        if let Some(err) = inner.exists_fault.take() {
            return Err(err);
        }

        Ok(match inner.attestations.get(fingerprint) {
            Some((locator, _)) => Attestation::present(locator.clone()),
            None => Attestation::absent(),
        })
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate> {
        Ok(FeeEstimate {
            base_fee: U256::from(30_000_000_000u64),
            priority_fee: U256::from(1_500_000_000u64),
        })
    }

    async fn submit_attestation(
        &self,
        fingerprint: &Fingerprint,
        locator: &ContentLocator,
    ) -> Result<LedgerReceipt> {
        let mut inner = self.lock()?;

        if let Some(err) = inner.submit_fault.take() {
            return Err(err);
        }

        if inner.attestations.contains_key(fingerprint) {
            return Err(LedgerError::TransactionWouldRevert(
                "execution reverted: Diploma already exists".into(),
            ));
        }

        let tx_hash = format!("0x{:064x}", inner.next_tx);
        let reference = LedgerReference::new(tx_hash, inner.next_block)
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        inner.next_tx += 1;
        inner.next_block += 1;
        inner.submissions += 1;

        inner
            .attestations
            .insert(*fingerprint, (locator.clone(), reference.clone()));

        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_then_exists() {
        let ledger = MemoryLedger::new();
        let fingerprint = Fingerprint::of(b"doc");
        let locator = ContentLocator::new("cs-loc-1").unwrap();

        assert!(!ledger.exists(&fingerprint).await.unwrap().exists);

        let receipt = ledger
            .submit_attestation(&fingerprint, &locator)
            .await
            .unwrap();
        assert_eq!(receipt.tx_hash.len(), 66);

        let attestation = ledger.exists(&fingerprint).await.unwrap();
        assert_eq!(attestation, Attestation::present(locator.clone()));

        assert!(matches!(
            ledger.submit_attestation(&fingerprint, &locator).await,
            Err(LedgerError::TransactionWouldRevert(_))
        ));
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let ledger = MemoryLedger::new();
        let fingerprint = Fingerprint::of(b"doc");
        let locator = ContentLocator::new("cs-loc-1").unwrap();

        ledger.fail_next_submit(LedgerError::ConfirmationTimeout {
            tx_hash: "0x01".into(),
        });
        assert!(matches!(
            ledger.submit_attestation(&fingerprint, &locator).await,
            Err(LedgerError::ConfirmationTimeout { .. })
        ));
        assert_eq!(ledger.submission_count(), 0);

        ledger.fail_next_exists(LedgerError::Transport("rpc down".into()));
        assert!(ledger.exists(&fingerprint).await.is_err());
        assert!(ledger.exists(&fingerprint).await.is_ok());
    }
}
