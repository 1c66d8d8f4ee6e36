//! The confirmed credential record and its descriptive metadata.
//!
//! A [`Credential`] exists only after the document is in the content store
//! and its fingerprint is attested on the ledger. It is never updated.

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::types::{ContentLocator, InternalId, LedgerReference, PublicId};

/// Descriptive fields about the credential holder and program.
///
/// Informational only: nothing in here participates in deduplication or in
/// any trust decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveMetadata {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub university: String,
    #[serde(default)]
    pub faculty: String,
    pub department: String,
    pub graduation_year: i32,
    #[serde(default)]
    pub student_number: String,
    #[serde(default)]
    pub nationality: String,
}

impl DescriptiveMetadata {
    /// Display name of the holder.
    pub fn owner_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Program description as shown on verification pages.
    pub fn degree(&self) -> String {
        format!("{} - {}", self.faculty.trim(), self.department.trim())
    }
}

/// Base URLs used to derive retrieval and explorer links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlScheme {
    /// Gateway serving uploaded documents, e.g. `https://arweave.net`.
    pub content_base_url: String,
    /// Block explorer, e.g. `https://amoy.polygonscan.com`.
    pub explorer_base_url: String,
}

impl UrlScheme {
    /// `{content_base_url}/{locator}`
    pub fn content_url(&self, locator: &ContentLocator) -> String {
        format!("{}/{}", self.content_base_url.trim_end_matches('/'), locator)
    }

    /// `{explorer_base_url}/tx/{tx_hash}`
    pub fn explorer_url(&self, reference: &LedgerReference) -> String {
        format!(
            "{}/tx/{}",
            self.explorer_base_url.trim_end_matches('/'),
            reference.tx_hash
        )
    }
}

impl Default for UrlScheme {
    fn default() -> Self {
        Self {
            content_base_url: "https://arweave.net".into(),
            explorer_base_url: "https://amoy.polygonscan.com".into(),
        }
    }
}

/// A confirmed issuance, as persisted in the metadata cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub internal_id: InternalId,
    pub public_id: PublicId,
    pub fingerprint: Fingerprint,
    pub content_locator: ContentLocator,
    pub content_url: String,
    pub ledger_reference: LedgerReference,
    pub ledger_url: String,
    pub owner: String,
    pub metadata: DescriptiveMetadata,
    /// Unix milliseconds at confirm-time persistence.
    pub issued_at: i64,
}

impl Credential {
    /// Materialize a credential, deriving the public id and both links.
    pub fn new(
        internal_id: InternalId,
        fingerprint: Fingerprint,
        content_locator: ContentLocator,
        ledger_reference: LedgerReference,
        metadata: DescriptiveMetadata,
        issued_at: i64,
        urls: &UrlScheme,
    ) -> Self {
        Self {
            public_id: internal_id.public_id(),
            content_url: urls.content_url(&content_locator),
            ledger_url: urls.explorer_url(&ledger_reference),
            owner: metadata.owner_name(),
            internal_id,
            fingerprint,
            content_locator,
            ledger_reference,
            metadata,
            issued_at,
        }
    }

    /// Issue date as `YYYY-MM-DD` (UTC).
    pub fn issue_date(&self) -> String {
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(self.issued_at)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}
