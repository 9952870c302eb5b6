//! A clock tests can move by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::TimeProvider;

/// Shared millisecond counter exposed as a [`TimeProvider`].
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn starting_at_secs(secs: u64) -> Self {
        let clock = Self::default();
        clock.set_secs(secs);
        clock
    }

    pub fn provider(&self) -> TimeProvider {
        let millis = Arc::clone(&self.millis);
        Arc::new(move || millis.load(Ordering::SeqCst))
    }

    pub fn set_secs(&self, secs: u64) {
        self.millis.store(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: u64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}
