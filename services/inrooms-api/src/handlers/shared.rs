//! Shared handler utilities
//!
//! Id parsing, bounded string checks and the operation latency histogram
//! used across handlers.

use std::time::Instant;

use uuid::Uuid;

use crate::error::ApiError;

/// Maximum length for free-text fields not validated deeper in the stack
const MAX_STRING_LEN: usize = 2048;

/// Parse a UUID field from a request body or path.
pub fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {field}")))
}

/// Validate a user-provided string is within safe bounds.
pub fn validate_string_length(value: &str, field_name: &str) -> Result<(), ApiError> {
    if value.len() > MAX_STRING_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field_name} too long (max {MAX_STRING_LEN} chars)"
        )));
    }
    Ok(())
}

/// Record HTTP operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "inrooms_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}

/// Time a handler body and record it under `operation`.
pub async fn timed<T, F>(operation: &'static str, fut: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    let start = Instant::now();
    let result = fut.await;
    record_op_duration(operation, start, result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "user_id").unwrap(), id);
        assert_eq!(parse_uuid(&format!(" {id} "), "user_id").unwrap(), id);

        let err = parse_uuid("not-a-uuid", "user_id").unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Invalid user_id");
        assert!(parse_uuid("", "event_id").is_err());
        assert!(parse_uuid("'; DROP TABLE users; --", "event_id").is_err());
    }

    #[test]
    fn test_validate_string_length() {
        assert!(validate_string_length("short", "description").is_ok());

        let long_string = "a".repeat(MAX_STRING_LEN + 1);
        assert!(validate_string_length(&long_string, "description").is_err());
    }
}
