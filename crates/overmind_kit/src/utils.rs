//! # Utility Functions
//!
//! Timestamp helper shared by the gateway and the backend actors. All
//! envelope timestamps go through [`current_timestamp_nanos`] so that
//! ordering comparisons across components use the same clock and unit.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in nanoseconds.
///
/// Saturates at `i64::MAX`, which is not reached before the year 2262.
pub fn current_timestamp_nanos() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanos_match_the_system_clock() {
        let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let nanos = current_timestamp_nanos();
        assert!(nanos / 1_000_000_000 >= secs);
        assert!(nanos / 1_000_000_000 - secs <= 1);
    }
}
