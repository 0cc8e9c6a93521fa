use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current time in milliseconds since the UNIX epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Milliseconds elapsed from `earlier` to `later`, zero if `later` is not after `earlier`
pub fn elapsed_millis(earlier: u64, later: u64) -> u64 {
    later.saturating_sub(earlier)
}

/// Convert a duration to whole milliseconds, saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
