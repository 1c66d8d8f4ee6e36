//! Descriptive metadata validation.
//!
//! Runs before any external store is touched, so a malformed request never
//! costs an upload or a transaction.

use chrono::Datelike;

use crate::credential::DescriptiveMetadata;
use crate::error::ValidationError;

/// Earliest graduation year accepted.
pub const MIN_GRADUATION_YEAR: i32 = 1950;

/// Validate metadata against the current calendar year.
pub fn validate_metadata(metadata: &DescriptiveMetadata) -> Result<(), ValidationError> {
    validate_metadata_at(metadata, chrono::Utc::now().year())
}

/// Validate metadata against an explicit current year.
///
/// Checks, in order:
/// - Required text fields are non-blank
/// - Email has a local part and a dotted domain
/// - Graduation year is within `MIN_GRADUATION_YEAR..=current_year + 1`
pub fn validate_metadata_at(
    metadata: &DescriptiveMetadata,
    current_year: i32,
) -> Result<(), ValidationError> {
    let required = [
        ("firstName", &metadata.first_name),
        ("lastName", &metadata.last_name),
        ("email", &metadata.email),
        ("university", &metadata.university),
        ("department", &metadata.department),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(name));
        }
    }

    if !looks_like_email(metadata.email.trim()) {
        return Err(ValidationError::InvalidEmail(metadata.email.clone()));
    }

    let max = current_year + 1;
    if metadata.graduation_year < MIN_GRADUATION_YEAR || metadata.graduation_year > max {
        return Err(ValidationError::GraduationYear {
            year: metadata.graduation_year,
            min: MIN_GRADUATION_YEAR,
            max,
        });
    }

    Ok(())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DescriptiveMetadata {
        DescriptiveMetadata {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@navy.example".into(),
            university: "Yale".into(),
            faculty: String::new(),
            department: "Mathematics".into(),
            graduation_year: 2020,
            student_number: String::new(),
            nationality: String::new(),
        }
    }

    #[test]
    fn test_valid_metadata() {
        assert_eq!(validate_metadata_at(&valid(), 2025), Ok(()));
    }

    #[test]
    fn test_blank_required_field() {
        let mut meta = valid();
        meta.department = "   ".into();
        assert_eq!(
            validate_metadata_at(&meta, 2025),
            Err(ValidationError::MissingField("department"))
        );
    }

    #[test]
    fn test_optional_fields_may_be_empty() {
        let mut meta = valid();
        meta.faculty.clear();
        meta.nationality.clear();
        assert!(validate_metadata_at(&meta, 2025).is_ok());
    }

    #[test]
    fn test_bad_email() {
        let mut meta = valid();
        meta.email = "grace-at-navy".into();
        assert!(matches!(
            validate_metadata_at(&meta, 2025),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_graduation_year_bounds() {
        let mut meta = valid();
        meta.graduation_year = 2026;
        assert!(validate_metadata_at(&meta, 2025).is_ok());

        meta.graduation_year = 2027;
        assert_eq!(
            validate_metadata_at(&meta, 2025),
            Err(ValidationError::GraduationYear {
                year: 2027,
                min: 1950,
                max: 2026
            })
        );

        meta.graduation_year = 1949;
        assert!(validate_metadata_at(&meta, 2025).is_err());
    }
}
