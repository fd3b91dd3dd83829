//! Small time and text helpers used throughout the crate.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Current Unix time in nanoseconds, used for locally-unique pending ids.
pub(crate) fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

/// Truncate preview text to `max_chars` characters, appending an ellipsis.
///
/// Operates on char boundaries so multi-byte text never gets split.
pub(crate) fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push('…');
        truncated
    }
}
