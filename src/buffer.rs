//! Pending-event buffer and its size/age policy.
//!
//! The buffer performs no I/O and never rejects an event: exceeding
//! `max_batch_size` only makes [`EventBuffer::should_flush`] report `true`.
//! Age is measured from the last drain (or from creation when the buffer has
//! never been drained).

use std::time::Duration;

use crate::log_event::{Batch, LogEvent};

/// Default number of buffered events that triggers a flush.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;
/// Default maximum batch age before a flush is due.
pub const DEFAULT_MAX_BATCH_AGE: Duration = Duration::from_millis(3000);

/// Size and age thresholds for batching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferPolicy {
    pub max_batch_size: usize,
    pub max_batch_age_millis: u64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_batch_age_millis: DEFAULT_MAX_BATCH_AGE.as_millis() as u64,
        }
    }
}

#[derive(Debug)]
pub struct EventBuffer {
    policy: BufferPolicy,
    events: Vec<LogEvent>,
    last_drain_millis: u64,
}

impl EventBuffer {
    /// Create an empty buffer whose age window starts at `now_millis`.
    pub fn new(policy: BufferPolicy, now_millis: u64) -> Self {
        Self {
            policy,
            events: Vec::new(),
            last_drain_millis: now_millis,
        }
    }

    pub fn add(&mut self, event: LogEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Milliseconds elapsed since the last drain.
    pub fn age_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.last_drain_millis)
    }

    /// True once the batch is full or has aged past the configured window.
    pub fn should_flush(&self, now_millis: u64) -> bool {
        self.events.len() >= self.policy.max_batch_size
            || self.age_millis(now_millis) >= self.policy.max_batch_age_millis
    }

    /// Hand out every buffered event and restart the age window.
    ///
    /// Draining an empty buffer yields an empty batch.
    pub fn drain(&mut self, now_millis: u64) -> Batch {
        self.last_drain_millis = now_millis;
        Batch::new(std::mem::take(&mut self.events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use rstest::{fixture, rstest};

    const START: u64 = 1_000_000;

    #[fixture]
    fn buffer() -> EventBuffer {
        EventBuffer::new(
            BufferPolicy {
                max_batch_size: 3,
                max_batch_age_millis: 500,
            },
            START,
        )
    }

    fn event(message: &str) -> LogEvent {
        LogEvent::new("test", Level::Info, message)
    }

    #[rstest]
    fn small_young_batch_is_not_due(mut buffer: EventBuffer) {
        buffer.add(event("a"));
        buffer.add(event("b"));
        assert!(!buffer.should_flush(START + 499));
    }

    #[rstest]
    fn full_batch_is_due(mut buffer: EventBuffer) {
        for msg in ["a", "b", "c"] {
            buffer.add(event(msg));
        }
        assert!(buffer.should_flush(START));
    }

    #[rstest]
    fn overflow_is_accepted(mut buffer: EventBuffer) {
        for i in 0..10 {
            buffer.add(event(&i.to_string()));
        }
        assert_eq!(buffer.len(), 10);
    }

    #[rstest]
    fn aged_batch_is_due(mut buffer: EventBuffer) {
        buffer.add(event("a"));
        assert!(buffer.should_flush(START + 500));
    }

    #[rstest]
    fn drain_preserves_order_and_empties(mut buffer: EventBuffer) {
        buffer.add(event("a"));
        buffer.add(event("b"));
        let batch = buffer.drain(START + 10);
        let messages: Vec<_> = batch.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["a", "b"]);
        assert!(buffer.is_empty());
        assert!(!buffer.should_flush(START + 10));
    }

    #[rstest]
    fn drain_restarts_age_window(mut buffer: EventBuffer) {
        buffer.add(event("a"));
        buffer.drain(START + 600);
        buffer.add(event("b"));
        assert!(!buffer.should_flush(START + 1000));
        assert!(buffer.should_flush(START + 1100));
    }

    #[rstest]
    fn draining_empty_buffer_is_safe(mut buffer: EventBuffer) {
        assert!(buffer.drain(START).is_empty());
        assert!(buffer.drain(START).is_empty());
    }
}
