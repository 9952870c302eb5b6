//! Batching HTTP log appender.
//!
//! Events are buffered and shipped to a remote collector as JSON arrays. A
//! flush happens when the batch is full or old enough, when the backoff window
//! after a failed delivery has passed, or immediately for `ERROR` and above.
//! Delivery is best effort: a batch that fails is dropped and the backoff
//! interval doubles until the next success.
//!
//! ```no_run
//! use pulse_appender::{AppenderBuilder, Level, LogEvent};
//!
//! let appender = AppenderBuilder::new()
//!     .with_address("http://localhost:9999/json")
//!     .with_buffer_size(500)
//!     .build()?;
//! appender.append(LogEvent::new("orders", Level::Info, "order placed"));
//! appender.close();
//! # Ok::<(), pulse_appender::BuildError>(())
//! ```

pub mod appender;
pub mod backoff;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod file_config;
pub mod level;
pub mod log_compat;
pub mod log_event;
pub mod rate_limited_warner;
pub mod serialise;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use appender::{FlushOutcome, HttpAppender};
pub use backoff::{BackoffPolicy, BackoffState, FlushReason, FlushState};
pub use buffer::{BufferPolicy, EventBuffer};
pub use clock::{TimeProvider, system_time_provider};
pub use config::{AppenderBuilder, AppenderConfig, BuildError};
pub use level::{Level, ParseLevelError};
pub use log_compat::{InstallError, install, installed, shutdown};
pub use log_event::{Batch, HOSTNAME_PROPERTY, LogEvent};
pub use serialise::{JsonSerialiser, SerialiseError, Serialiser};
pub use transport::{AuthConfig, HttpTransport, Transport, TransportError, TransportOptions};
