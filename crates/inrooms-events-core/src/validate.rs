//! Input validation shared by the services

use inrooms_types::EXTENDED_MAX_VISIBILITY_DAYS;

use crate::AdmissionError;

const MAX_TITLE_LEN: usize = 200;
const MAX_CAPACITY: i32 = 10_000;
const MAX_URL_LEN: usize = 2048;
const MAX_FEATURED_DAYS: i64 = EXTENDED_MAX_VISIBILITY_DAYS;

pub(crate) fn title(value: &str) -> Result<(), AdmissionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdmissionError::InvalidInput("title cannot be empty".into()));
    }
    if trimmed.len() > MAX_TITLE_LEN {
        return Err(AdmissionError::InvalidInput(format!(
            "title too long (max {MAX_TITLE_LEN} chars)"
        )));
    }
    Ok(())
}

pub(crate) fn capacity(value: i32) -> Result<(), AdmissionError> {
    if !(1..=MAX_CAPACITY).contains(&value) {
        return Err(AdmissionError::InvalidInput(format!(
            "capacity must be between 1 and {MAX_CAPACITY}"
        )));
    }
    Ok(())
}

pub(crate) fn featured_days(value: i64) -> Result<(), AdmissionError> {
    if !(1..=MAX_FEATURED_DAYS).contains(&value) {
        return Err(AdmissionError::InvalidInput(format!(
            "featured days must be between 1 and {MAX_FEATURED_DAYS}"
        )));
    }
    Ok(())
}

pub(crate) fn recording_url(value: &str) -> Result<(), AdmissionError> {
    if value.len() > MAX_URL_LEN {
        return Err(AdmissionError::InvalidInput("recording URL too long".into()));
    }
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(AdmissionError::InvalidInput(
            "recording URL must be http(s)".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title() {
        assert!(title("Demo day").is_ok());
        assert!(title("   ").is_err());
        assert!(title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn test_capacity() {
        assert!(capacity(1).is_ok());
        assert!(capacity(MAX_CAPACITY).is_ok());
        assert!(capacity(0).is_err());
        assert!(capacity(-3).is_err());
        assert!(capacity(MAX_CAPACITY + 1).is_err());
    }

    #[test]
    fn test_featured_days() {
        assert!(featured_days(1).is_ok());
        assert!(featured_days(MAX_FEATURED_DAYS).is_ok());
        assert!(featured_days(0).is_err());
        assert!(featured_days(MAX_FEATURED_DAYS + 1).is_err());
        assert!(featured_days(i64::MAX).is_err());
    }

    #[test]
    fn test_recording_url() {
        assert!(recording_url("https://cdn.example.com/rec.mp4").is_ok());
        assert!(recording_url("javascript:alert(1)").is_err());
        assert!(recording_url("ftp://example.com/rec").is_err());
    }
}
