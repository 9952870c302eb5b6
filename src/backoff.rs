//! Exponential backoff and flush bookkeeping used by the appender.
//!
//! [`FlushState`] records when the collector last accepted a batch and how
//! long to wait before retrying after a failure. The backoff interval doubles
//! on every consecutive failure and returns to the initial value as soon as a
//! flush succeeds.

/// Default backoff applied after the first failed flush.
pub const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 1;
/// Default ceiling for the backoff interval.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 3600;

/// Exponential backoff policy for flush retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_secs: u64,
    /// Upper bound for the interval; `None` lets it grow without limit.
    pub max_secs: Option<u64>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            max_secs: Some(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

/// Tracks the current backoff interval.
#[derive(Clone, Debug)]
pub struct BackoffState {
    policy: BackoffPolicy,
    current_secs: u64,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current_secs: policy.initial_secs,
            policy,
        }
    }

    pub fn current_secs(&self) -> u64 {
        self.current_secs
    }

    /// Double the interval, saturating at the ceiling.
    pub fn record_failure(&mut self) {
        let doubled = self.current_secs.saturating_mul(2);
        self.current_secs = match self.policy.max_secs {
            Some(max) => doubled.min(max.max(self.policy.initial_secs)),
            None => doubled,
        };
    }

    pub fn record_success(&mut self) {
        self.current_secs = self.policy.initial_secs;
    }
}

/// Why a flush attempt was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushReason {
    /// The buffer is full or old enough and the previous flush succeeded.
    BatchReady,
    /// The backoff window since the last success has elapsed.
    BackoffElapsed,
    /// The incoming event is severe enough to bypass all gating.
    Escalation,
}

/// Delivery history consulted by the flush decision.
#[derive(Clone, Debug)]
pub struct FlushState {
    last_successful_flush_secs: u64,
    last_flush_succeeded: bool,
    backoff: BackoffState,
}

impl FlushState {
    /// Start with a notional success at `now_secs`.
    pub fn new(policy: BackoffPolicy, now_secs: u64) -> Self {
        Self {
            last_successful_flush_secs: now_secs,
            last_flush_succeeded: true,
            backoff: BackoffState::new(policy),
        }
    }

    pub fn last_successful_flush_secs(&self) -> u64 {
        self.last_successful_flush_secs
    }

    pub fn last_flush_succeeded(&self) -> bool {
        self.last_flush_succeeded
    }

    pub fn backoff_secs(&self) -> u64 {
        self.backoff.current_secs()
    }

    /// Strictly after the last success plus the current backoff.
    pub fn backoff_elapsed(&self, now_secs: u64) -> bool {
        now_secs
            > self
                .last_successful_flush_secs
                .saturating_add(self.backoff.current_secs())
    }

    /// Decide whether a flush attempt should start.
    ///
    /// Reasons are independent; the first matching one is reported, with
    /// escalation checked first since it overrides everything else.
    pub fn flush_reason(
        &self,
        batch_ready: bool,
        escalate: bool,
        now_secs: u64,
    ) -> Option<FlushReason> {
        if escalate {
            Some(FlushReason::Escalation)
        } else if batch_ready && self.last_flush_succeeded {
            Some(FlushReason::BatchReady)
        } else if self.backoff_elapsed(now_secs) {
            Some(FlushReason::BackoffElapsed)
        } else {
            None
        }
    }

    /// Record the outcome of a flush attempt made at `now_secs`.
    pub fn record_outcome(&mut self, delivered: bool, now_secs: u64) {
        self.last_flush_succeeded = delivered;
        if delivered {
            self.last_successful_flush_secs = now_secs;
            self.backoff.record_success();
        } else {
            self.backoff.record_failure();
        }
    }
}
