//! Wall-clock source shared by the buffer and flush controller.
//!
//! Time is injected as a closure so tests can drive the batching and backoff
//! windows deterministically.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns milliseconds since the UNIX epoch.
pub type TimeProvider = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Returns the current time in milliseconds since the UNIX epoch.
///
/// Returns 0 if the system clock is before the UNIX epoch.
pub fn system_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// The default [`TimeProvider`] backed by [`SystemTime`].
pub fn system_time_provider() -> TimeProvider {
    Arc::new(system_time_millis)
}

/// Whole seconds for a millisecond timestamp.
pub(crate) fn millis_to_secs(millis: u64) -> u64 {
    millis / 1000
}
