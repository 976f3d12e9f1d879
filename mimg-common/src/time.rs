//! Time helpers
//!
//! All persisted timestamps are integer Unix epoch milliseconds.

/// Current wall-clock time in Unix epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
