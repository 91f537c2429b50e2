use uuid::Uuid;

use crate::models::page::Page;
use crate::utils::error::{AppError, AppResult};

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Content is stored verbatim; the only rule is that it is not empty.
pub fn validate_message_content(content: &str) -> AppResult<()> {
    if content.is_empty() {
        return Err(AppError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Parses a UUID-shaped identifier and returns its canonical lowercase hyphenated form.
fn parse_uuid(value: &str, field: &str) -> AppResult<String> {
    Uuid::parse_str(value.trim())
        .map(|id| id.to_string())
        .map_err(|_| AppError::Validation(format!("{} must be a valid UUID", field)))
}

pub fn parse_user_id(value: &str) -> AppResult<String> {
    parse_uuid(value, "User id")
}

pub fn parse_message_id(value: &str) -> AppResult<String> {
    parse_uuid(value, "Message id")
}

pub fn parse_application_id(value: Option<&str>) -> AppResult<Option<String>> {
    value
        .map(|id| parse_uuid(id, "Application id"))
        .transpose()
}

/// Clamps raw query values into a page: `limit` in `[0, 100]` defaulting to 50, `offset >= 0`.
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> Page {
    Page {
        limit: limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(0, MAX_PAGE_LIMIT),
        offset: offset.unwrap_or(0).max(0),
    }
}
