//! Error types for credchain core.

use thiserror::Error;

/// Errors from parsing or constructing core identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid public id: {0}")]
    InvalidPublicId(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Descriptive metadata validation failures.
///
/// These are raised before any external store is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid graduation year {year}: expected {min}..={max}")]
    GraduationYear { year: i32, min: i32, max: i32 },

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}
