//! Timestamp utilities for keep-alive bookkeeping.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, saturating at zero if the clock is
/// before the epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_millis_monotonic_enough() {
        let a = unix_millis();
        let b = unix_millis();
        assert!(b >= a);
        // Sanity: after 2020.
        assert!(a > 1_577_836_800_000);
    }
}
