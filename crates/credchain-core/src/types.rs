//! Strong type definitions for credchain.
//!
//! All identifiers are newtypes to prevent mixing up the storage key, the
//! shareable id and the two external references at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Prefix of every public identifier.
pub const PUBLIC_ID_PREFIX: &str = "BC-";

/// Number of hex digits taken from the internal id.
const PUBLIC_ID_DIGITS: usize = 12;

/// Total length of a public identifier.
pub const PUBLIC_ID_LEN: usize = PUBLIC_ID_PREFIX.len() + PUBLIC_ID_DIGITS;

/// Storage key of a credential: a UUIDv7, so keys sort by issuance time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InternalId(pub Uuid);

impl InternalId {
    /// Generate a fresh time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Derive the public identifier for this id.
    pub fn public_id(&self) -> PublicId {
        PublicId::derive(self)
    }
}

impl fmt::Debug for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternalId({})", self.0)
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Short, shareable credential identifier: `BC-` followed by the last twelve
/// hex digits of the internal id, uppercase.
///
/// The truncation discards the timestamp half of the UUID, so the internal id
/// cannot be recovered from it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicId(String);

impl PublicId {
    /// Derive from an internal id.
    pub fn derive(id: &InternalId) -> Self {
        let bytes = id.0.as_bytes();
        let tail = hex::encode_upper(&bytes[bytes.len() - PUBLIC_ID_DIGITS / 2..]);
        Self(format!("{}{}", PUBLIC_ID_PREFIX, tail))
    }

    /// Parse a user-supplied identifier. Case-insensitive; surrounding
    /// whitespace is ignored.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let normalized = s.trim().to_ascii_uppercase();
        let digits = normalized
            .strip_prefix(PUBLIC_ID_PREFIX)
            .ok_or_else(|| CoreError::InvalidPublicId(s.to_string()))?;
        if digits.len() != PUBLIC_ID_DIGITS || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidPublicId(s.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicId({})", self.0)
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PublicId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PublicId> for String {
    fn from(id: PublicId) -> Self {
        id.0
    }
}

/// Opaque reference returned by the content store for an uploaded document.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentLocator(String);

impl ContentLocator {
    /// Wrap a locator. Empty (or whitespace-only) locators are rejected.
    pub fn new(locator: impl Into<String>) -> Result<Self, CoreError> {
        let locator = locator.into();
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidIdentifier("empty content locator".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentLocator({})", self.0)
    }
}

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the ledger transaction that attested a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerReference {
    /// Transaction hash as reported by the ledger (`0x`-prefixed hex).
    pub tx_hash: String,
    /// Block that included the transaction.
    pub block_number: u64,
}

impl LedgerReference {
    /// Build a reference. The hash is trimmed and lowercased so that the
    /// same transaction always compares equal.
    pub fn new(tx_hash: impl AsRef<str>, block_number: u64) -> Result<Self, CoreError> {
        let tx_hash = tx_hash.as_ref().trim().to_ascii_lowercase();
        if tx_hash.is_empty() {
            return Err(CoreError::InvalidIdentifier("empty ledger transaction hash".into()));
        }
        Ok(Self {
            tx_hash,
            block_number,
        })
    }

    /// Whether two references name the same transaction.
    pub fn same_transaction(&self, other: &LedgerReference) -> bool {
        self.tx_hash.eq_ignore_ascii_case(&other.tx_hash)
    }
}

impl fmt::Display for LedgerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.tx_hash, self.block_number)
    }
}
