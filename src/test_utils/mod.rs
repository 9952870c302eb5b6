//! Test helpers shared by unit and integration tests.
//!
//! Compiled for unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

mod manual_clock;
mod recording_transport;

pub use manual_clock::ManualClock;
pub use recording_transport::RecordingTransport;
