//! The flush controller.
//!
//! [`HttpAppender`] receives events, buffers them, and decides on every
//! append whether to flush. A flush drains the whole buffer, serialises it,
//! and hands it to the transport; the outcome updates the backoff state. A
//! drained batch is never re-buffered: after a failure only the backoff timer
//! schedules the next attempt.
//!
//! There is no background thread. The age threshold is only evaluated when
//! the next event arrives, when the host calls [`HttpAppender::flush`], or on
//! [`HttpAppender::close`].
//!
//! No public method returns an error or unwinds. Faults raised by the
//! serialiser or transport, including panics, are logged and counted as a
//! failed flush.
//!
//! Delivery runs with the appender's lock held. Anything the serialiser or
//! transport logs on that thread (an HTTP client's own `debug!` records, for
//! instance) would otherwise come straight back into [`HttpAppender::append`]
//! and block on the same lock, so events raised during delivery are discarded.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    backoff::{FlushReason, FlushState},
    buffer::EventBuffer,
    clock::{TimeProvider, millis_to_secs},
    config::AppenderConfig,
    level::Level,
    log_event::{Batch, LogEvent},
    rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner},
    serialise::{SerialiseError, Serialiser},
    transport::Transport,
};

/// Result of a single flush attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    Delivered,
    Failed,
    /// Nothing was buffered, so nothing was sent.
    Empty,
}

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as handing a batch to the collaborators.
struct DeliveryGuard {
    outer: bool,
}

impl DeliveryGuard {
    fn enter() -> Self {
        Self {
            outer: DELIVERING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(self.outer));
    }
}

/// Whether this thread is inside a serialiser or transport call made by an
/// appender.
pub(crate) fn delivering_on_this_thread() -> bool {
    DELIVERING.with(Cell::get)
}

struct Inner {
    buffer: EventBuffer,
    state: FlushState,
    serialiser: Box<dyn Serialiser>,
    transport: Box<dyn Transport>,
    closed: bool,
}

impl Inner {
    fn flush(&mut self, now_millis: u64) -> FlushOutcome {
        let batch = self.buffer.drain(now_millis);
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }
        let size = batch.len();
        let delivered = match panic::catch_unwind(AssertUnwindSafe(|| self.deliver(&batch))) {
            Ok(Ok(delivered)) => delivered,
            Ok(Err(err)) => {
                warn!("HttpAppender could not serialise {size} events: {err}");
                false
            }
            Err(payload) => {
                warn!(
                    "HttpAppender caught panic while flushing {size} events: {}",
                    panic_message(payload.as_ref())
                );
                false
            }
        };
        self.state
            .record_outcome(delivered, millis_to_secs(now_millis));
        if delivered {
            FlushOutcome::Delivered
        } else {
            warn!(
                "HttpAppender dropped batch of {size} events; next retry in {}s",
                self.state.backoff_secs()
            );
            FlushOutcome::Failed
        }
    }

    fn deliver(&mut self, batch: &Batch) -> Result<bool, SerialiseError> {
        let _guard = DeliveryGuard::enter();
        let payload = self.serialiser.marshal(batch)?;
        Ok(self.transport.send(&payload))
    }
}

/// Batching log appender shipping events to an HTTP collector.
///
/// Each append, flush evaluation, and drain runs as one critical section, so
/// the appender may be shared freely between threads.
pub struct HttpAppender {
    inner: Mutex<Inner>,
    threshold: Level,
    hostname: Option<String>,
    clock: TimeProvider,
    warner: RateLimitedWarner,
}

impl HttpAppender {
    /// Assemble an appender from validated configuration and collaborators.
    pub fn from_parts(
        config: AppenderConfig,
        serialiser: Box<dyn Serialiser>,
        transport: Box<dyn Transport>,
        clock: TimeProvider,
    ) -> Self {
        let now = clock();
        Self {
            inner: Mutex::new(Inner {
                buffer: EventBuffer::new(config.buffer, now),
                state: FlushState::new(config.backoff, millis_to_secs(now)),
                serialiser,
                transport,
                closed: false,
            }),
            threshold: config.threshold,
            hostname: config.hostname,
            warner: RateLimitedWarner::new(DEFAULT_WARN_INTERVAL, Arc::clone(&clock)),
            clock,
        }
    }

    /// Buffer `event` and flush if any trigger fires.
    ///
    /// Events raised on a thread that is currently delivering a batch are
    /// discarded.
    pub fn append(&self, event: LogEvent) {
        if event.level < self.threshold || delivering_on_this_thread() {
            return;
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.append_inner(event))) {
            warn!(
                "HttpAppender unexpected error while appending: {}",
                panic_message(payload.as_ref())
            );
        }
    }

    fn append_inner(&self, mut event: LogEvent) {
        if let Some(hostname) = &self.hostname {
            event.inject_hostname(hostname);
        }
        let escalate = event.level.escalates();

        let mut inner = self.inner.lock();
        if inner.closed {
            drop(inner);
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("HttpAppender dropped {count} events after close");
            });
            return;
        }
        inner.buffer.add(event);

        let now = (self.clock)();
        let batch_ready = inner.buffer.should_flush(now);
        if let Some(reason) = inner
            .state
            .flush_reason(batch_ready, escalate, millis_to_secs(now))
        {
            debug!(
                "HttpAppender flushing {} events ({reason:?})",
                inner.buffer.len()
            );
            inner.flush(now);
        }
    }

    /// Flush whatever is buffered right now, ignoring batching and backoff.
    ///
    /// Returns `true` when the batch was delivered or there was nothing to
    /// send.
    pub fn flush(&self) -> bool {
        if delivering_on_this_thread() {
            return false;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut inner = self.inner.lock();
            if inner.closed {
                return FlushOutcome::Empty;
            }
            let now = (self.clock)();
            inner.flush(now)
        }));
        match outcome {
            Ok(FlushOutcome::Failed) => false,
            Ok(_) => true,
            Err(payload) => {
                warn!(
                    "HttpAppender unexpected error while flushing: {}",
                    panic_message(payload.as_ref())
                );
                false
            }
        }
    }

    /// Make one final flush attempt and release the transport.
    ///
    /// Safe to call any number of times; only the first call has an effect.
    pub fn close(&self) {
        if delivering_on_this_thread() {
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            let now = (self.clock)();
            inner.flush(now);
            let _guard = DeliveryGuard::enter();
            if let Err(err) = inner.transport.close() {
                warn!("HttpAppender unexpected error while closing transport: {err}");
            }
        }));
        if let Err(payload) = result {
            warn!(
                "HttpAppender unexpected error while closing: {}",
                panic_message(payload.as_ref())
            );
        }
        self.warner.report_pending(|count| {
            warn!("HttpAppender dropped {count} events after close");
        });
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of events waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    /// Current backoff interval in seconds.
    pub fn backoff_secs(&self) -> u64 {
        self.inner.lock().state.backoff_secs()
    }

    /// Whether the most recent flush attempt was accepted.
    pub fn last_flush_succeeded(&self) -> bool {
        self.inner.lock().state.last_flush_succeeded()
    }

    /// Minimum level accepted by [`append`](Self::append).
    pub fn threshold(&self) -> Level {
        self.threshold
    }

    /// Evaluate the flush decision without appending, for diagnostics.
    pub fn pending_flush_reason(&self, escalate: bool) -> Option<FlushReason> {
        let inner = self.inner.lock();
        let now = (self.clock)();
        let batch_ready = inner.buffer.should_flush(now);
        inner
            .state
            .flush_reason(batch_ready, escalate, millis_to_secs(now))
    }
}

impl Drop for HttpAppender {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for HttpAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAppender")
            .field("threshold", &self.threshold)
            .field("hostname", &self.hostname)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
