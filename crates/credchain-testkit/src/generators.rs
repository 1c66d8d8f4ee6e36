//! Proptest generators for property-based testing.

use proptest::prelude::*;
use rand::RngCore;

use credchain_core::{ContentLocator, DescriptiveMetadata, Fingerprint, InternalId};

/// Generate a capitalized name.
pub fn name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,15}".prop_map(String::from)
}

/// Generate valid descriptive metadata.
pub fn metadata() -> impl Strategy<Value = DescriptiveMetadata> {
    (
        name(),
        name(),
        "[a-z]{1,10}",
        "[A-Z][a-z]{2,12} University",
        "[A-Z][a-z]{2,15}",
        "[A-Z][a-z]{2,15}",
        1950i32..=2024,
        "[0-9]{6,10}",
    )
        .prop_map(
            |(first, last, mailbox, university, faculty, department, year, number)| {
                DescriptiveMetadata {
                    first_name: first,
                    last_name: last,
                    email: format!("{}@example.edu", mailbox),
                    university,
                    faculty,
                    department,
                    graduation_year: year,
                    student_number: number,
                    nationality: String::new(),
                }
            },
        )
}

/// Generate non-empty document bytes of at most `max_len`.
pub fn document(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Generate a random Fingerprint.
pub fn fingerprint() -> impl Strategy<Value = Fingerprint> {
    any::<[u8; 32]>().prop_map(Fingerprint::from_bytes)
}

/// Generate a content locator.
pub fn content_locator() -> impl Strategy<Value = ContentLocator> {
    "[A-Za-z0-9_-]{43}".prop_filter_map("locator", |s| ContentLocator::new(s).ok())
}

/// Generate a `0x`-prefixed 32-byte transaction hash.
pub fn tx_hash() -> impl Strategy<Value = String> {
    any::<[u8; 32]>().prop_map(|bytes| format!("0x{}", hex::encode(bytes)))
}

/// Generate an internal id from arbitrary UUID bytes.
pub fn internal_id() -> impl Strategy<Value = InternalId> {
    any::<[u8; 16]>().prop_map(|bytes| InternalId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Random document bytes outside proptest.
pub fn random_document(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use credchain_core::{validate_metadata, LedgerReference, PublicId, PUBLIC_ID_LEN};

    proptest! {
        #[test]
        fn test_generated_metadata_is_valid(m in metadata()) {
            prop_assert!(validate_metadata(&m).is_ok());
        }

        #[test]
        fn test_fingerprint_deterministic(doc in document(512)) {
            prop_assert_eq!(Fingerprint::of(&doc), Fingerprint::of(&doc));
        }

        #[test]
        fn test_fingerprint_unique_with_different_documents(
            d1 in document(128),
            d2 in document(128),
        ) {
            prop_assume!(d1 != d2);
            prop_assert_ne!(Fingerprint::of(&d1), Fingerprint::of(&d2));
        }

        #[test]
        fn test_fingerprint_hex_roundtrip(fp in fingerprint()) {
            prop_assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
        }

        #[test]
        fn test_public_id_shape(id in internal_id()) {
            let public = id.public_id();
            prop_assert_eq!(public.as_str().len(), PUBLIC_ID_LEN);
            prop_assert_eq!(PublicId::parse(&public.as_str().to_lowercase()).unwrap(), public);
        }

        #[test]
        fn test_generated_tx_hash_is_a_reference(hash in tx_hash(), block in 1u64..) {
            let reference = LedgerReference::new(&hash, block).unwrap();
            prop_assert_eq!(reference.tx_hash, hash);
        }
    }

    #[test]
    fn test_random_document_len() {
        let doc = random_document(64);
        assert_eq!(doc.len(), 64);
        assert_ne!(doc, random_document(64));
    }
}
