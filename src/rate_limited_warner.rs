//! Throttled reporting of events the appender had to discard.
//!
//! Every discarded event bumps a counter. A summary warning carrying the count
//! goes out at most once per interval, measured on the appender's clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::clock::TimeProvider;

/// Minimum spacing between two drop summaries.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

pub struct RateLimitedWarner {
    clock: TimeProvider,
    interval_millis: u64,
    dropped: AtomicU64,
    /// Earliest clock reading at which the next summary may be emitted.
    quiet_until_millis: AtomicU64,
}

impl RateLimitedWarner {
    /// The first summary is allowed straight away.
    pub fn new(interval: Duration, clock: TimeProvider) -> Self {
        Self {
            clock,
            interval_millis: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            dropped: AtomicU64::new(0),
            quiet_until_millis: AtomicU64::new(0),
        }
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Hand the pending count to `report` unless a summary went out within
    /// the interval.
    pub fn warn_if_due(&self, report: impl FnOnce(u64)) {
        let now = (self.clock)();
        if now < self.quiet_until_millis.load(Ordering::Relaxed) {
            return;
        }
        self.emit(now, report);
    }

    /// Report any pending count regardless of the interval.
    pub fn report_pending(&self, report: impl FnOnce(u64)) {
        self.emit((self.clock)(), report);
    }

    fn emit(&self, now: u64, report: impl FnOnce(u64)) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count == 0 {
            return;
        }
        report(count);
        self.quiet_until_millis
            .store(now.saturating_add(self.interval_millis), Ordering::Relaxed);
    }
}
