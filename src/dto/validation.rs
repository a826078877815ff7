//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length of a media reference (URL or storage key).
const MAX_MEDIA_REFERENCE_LEN: usize = 2048;

/// Rejects strings made only of whitespace.
///
/// ```ignore
/// validate_not_blank("Quiz night") // Ok
/// validate_not_blank("   ")        // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Media references are opaque but must be a single bounded token.
pub fn validate_media_reference(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_MEDIA_REFERENCE_LEN {
        let mut err = ValidationError::new("media_length");
        err.message = Some(
            format!(
                "Media reference must be at most {MAX_MEDIA_REFERENCE_LEN} bytes (got {})",
                value.len()
            )
            .into(),
        );
        return Err(err);
    }

    if value.is_empty() || value.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("media_format");
        err.message = Some("Media reference must be non-empty and contain no whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Quiz").is_ok());
        assert!(validate_not_blank(" a ").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_validate_media_reference() {
        assert!(validate_media_reference("https://cdn.example/clip.mp3").is_ok());
        assert!(validate_media_reference("media/42").is_ok());
        assert!(validate_media_reference("").is_err());
        assert!(validate_media_reference("two words").is_err());
        assert!(validate_media_reference(&"a".repeat(MAX_MEDIA_REFERENCE_LEN + 1)).is_err());
    }
}
