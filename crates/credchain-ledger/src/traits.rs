//! Ledger trait: what the coordinator needs from the attestation ledger.

use async_trait::async_trait;
use ethers::types::U256;
use ethers::utils::format_units;

use credchain_core::{ContentLocator, Fingerprint, LedgerReference};

use crate::error::Result;

/// Reference returned by a confirmed attestation.
pub type LedgerReceipt = LedgerReference;

/// Ledger state for one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attestation {
    pub exists: bool,
    /// Locator recorded with the attestation; `None` when not attested or
    /// when the ledger stored an empty locator.
    pub content_locator: Option<ContentLocator>,
}

impl Attestation {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn present(locator: ContentLocator) -> Self {
        Self {
            exists: true,
            content_locator: Some(locator),
        }
    }
}

/// Current fee parameters, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeEstimate {
    /// Used as the fee cap of EIP-1559 transactions.
    pub base_fee: U256,
    /// Tip offered to the block producer.
    pub priority_fee: U256,
}

impl FeeEstimate {
    /// Fee cap rendered in gwei.
    pub fn base_fee_gwei(&self) -> String {
        to_gwei(self.base_fee)
    }

    /// Tip rendered in gwei.
    pub fn priority_fee_gwei(&self) -> String {
        to_gwei(self.priority_fee)
    }
}

fn to_gwei(wei: U256) -> String {
    format_units(wei, "gwei").unwrap_or_else(|_| format!("{} wei", wei))
}

/// The Ledger trait: fingerprint attestation.
///
/// # Design Notes
///
/// - `exists` and `fee_estimate` are read-only and always safe to retry.
/// - `submit_attestation` never retries internally. A
///   `ConfirmationTimeout` means the outcome is unknown; callers re-query
///   `exists` before resubmitting.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Look up the attestation for a fingerprint.
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<Attestation>;

    /// Current fee parameters. Advisory only.
    async fn fee_estimate(&self) -> Result<FeeEstimate>;

    /// Attest `fingerprint -> locator` and wait for the receipt.
    async fn submit_attestation(
        &self,
        fingerprint: &Fingerprint,
        locator: &ContentLocator,
    ) -> Result<LedgerReceipt>;
}
