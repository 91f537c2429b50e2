use axum::http::HeaderMap;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Mutex;

use crate::utils::error::{AppError, AppResult};

/// Reads the caller id stamped by the auth middleware. Never trusts anything else.
pub fn extract_user_id(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get(crate::middleware::auth::AUTH_USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Unauthenticated("Missing authenticated user".to_string()))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Hands out strictly increasing UTC timestamps, so rows written by one process sort in write
/// order even when the wall clock stalls or steps backwards.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<DateTime<Utc>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }

    pub fn now_string(&self) -> String {
        format_timestamp(self.now())
    }

    /// Makes sure the next stamp lands strictly after `previous` (e.g. a row's `updated_at`).
    pub fn after(&self, previous: &str) -> String {
        if let Ok(previous) = DateTime::parse_from_rfc3339(previous) {
            let previous = previous.with_timezone(&Utc);
            let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if previous > *last {
                *last = previous;
            }
        }
        self.now_string()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
