pub mod auth;
pub mod db;

use chrono::{DateTime, Utc};
use forum_chat_core::ports::ChatError;

/// Collapses any sqlx failure into the core's fatal storage variant.
pub(crate) fn storage(err: sqlx::Error) -> ChatError {
    ChatError::Storage(err.to_string())
}

/// Timestamps are persisted as microseconds since the Unix epoch so that
/// monotonic comparisons stay integer comparisons in SQL.
pub(crate) fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

pub(crate) fn micros_to_utc(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
}
