//! Helpers shared by the project modules.

pub mod patch;

pub use patch::Patch;

use std::borrow::Cow;

use time::OffsetDateTime;
use validator::ValidationError;

/// `validator` rule: the value must contain something besides whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::from("must not be empty"));
        return Err(error);
    }
    Ok(())
}

/// Trim an optional free-text value, dropping it when nothing is left.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Current time, never earlier than `previous`.
pub fn timestamp_after(previous: OffsetDateTime) -> OffsetDateTime {
    OffsetDateTime::now_utc().max(previous)
}
