//! Golden test vectors for deterministic verification.
//!
//! Fingerprints must match what any SHA-256 tool prints for the same bytes,
//! and public ids are a pure function of the internal id. A mismatch means
//! existing attestations or shared links would stop resolving.

use credchain_core::{Fingerprint, InternalId};
use uuid::Uuid;

/// A document with its expected fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintVector {
    pub name: &'static str,
    pub document: &'static [u8],
    /// Expected fingerprint (lowercase hex).
    pub expected: &'static str,
}

/// An internal id with its expected public id.
#[derive(Debug, Clone)]
pub struct PublicIdVector {
    pub name: &'static str,
    pub internal_id: &'static str,
    pub expected: &'static str,
}

/// Get all fingerprint vectors.
pub fn fingerprint_vectors() -> Vec<FingerprintVector> {
    vec![
        FingerprintVector {
            name: "empty",
            document: b"",
            expected: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
        FingerprintVector {
            name: "abc",
            document: b"abc",
            expected: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        },
        FingerprintVector {
            name: "hello world",
            document: b"hello world",
            expected: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
        },
    ]
}

/// Get all public id vectors.
pub fn public_id_vectors() -> Vec<PublicIdVector> {
    vec![
        PublicIdVector {
            name: "v7 uuid",
            internal_id: "018f2b6c-1a2b-7c3d-8e4f-0123456789ab",
            expected: "BC-0123456789AB",
        },
        PublicIdVector {
            name: "nil uuid",
            internal_id: "00000000-0000-0000-0000-000000000000",
            expected: "BC-000000000000",
        },
        PublicIdVector {
            name: "max uuid",
            internal_id: "ffffffff-ffff-ffff-ffff-ffffffffffff",
            expected: "BC-FFFFFFFFFFFF",
        },
    ]
}

/// Check every vector, returning `(name, matches, computed)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let fingerprints = fingerprint_vectors().into_iter().map(|v| {
        let hex = Fingerprint::of(v.document).to_hex();
        (v.name.to_string(), hex == v.expected, hex)
    });

    let public_ids = public_id_vectors().into_iter().map(|v| {
        let computed = Uuid::parse_str(v.internal_id)
            .map(|uuid| InternalId::from_uuid(uuid).public_id().to_string())
            .unwrap_or_else(|e| format!("unparseable: {}", e));
        (v.name.to_string(), computed == v.expected, computed)
    });

    fingerprints.chain(public_ids).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, computed) in verify_all_vectors() {
            assert!(matches, "vector '{}' computed {}", name, computed);
        }
    }

    #[test]
    fn test_public_ids_are_fifteen_chars() {
        for vector in public_id_vectors() {
            assert_eq!(vector.expected.len(), 15, "vector '{}'", vector.name);
        }
    }
}
