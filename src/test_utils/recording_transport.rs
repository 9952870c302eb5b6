//! A transport that stores every payload it is given.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::transport::{Transport, TransportError};

#[derive(Debug, Default)]
struct State {
    payloads: Vec<String>,
    fail_remaining: usize,
    panic_next: bool,
    closes: usize,
    close_error: Option<String>,
    send_delay: Duration,
}

/// Transport that records payloads and can be told to fail or panic.
///
/// Clones share state, so a test keeps one clone while the appender owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<State>>,
}

impl RecordingTransport {
    /// Report the next `count` sends as rejected.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_remaining = count;
    }

    /// Panic inside the next send.
    pub fn panic_next(&self) {
        self.state.lock().panic_next = true;
    }

    /// Sleep this long inside every later `send`, after recording the payload.
    pub fn delay_sends(&self, delay: Duration) {
        self.state.lock().send_delay = delay;
    }

    /// Make every later `close` report `reason`.
    pub fn fail_close(&self, reason: &str) {
        self.state.lock().close_error = Some(reason.to_owned());
    }

    /// Number of send attempts, successful or not.
    pub fn batch_count(&self) -> usize {
        self.state.lock().payloads.len()
    }

    /// Parsed events of the `index`th payload.
    pub fn batch(&self, index: usize) -> Vec<serde_json::Value> {
        let payload = self.state.lock().payloads[index].clone();
        serde_json::from_str(&payload).expect("payload is a JSON array")
    }

    /// Messages of the `index`th payload, in order.
    pub fn messages(&self, index: usize) -> Vec<String> {
        self.batch(index)
            .iter()
            .map(|event| event["message"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, payload: &str) -> bool {
        let (should_panic, delay) = {
            let mut state = self.state.lock();
            state.payloads.push(payload.to_owned());
            (std::mem::take(&mut state.panic_next), state.send_delay)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if should_panic {
            panic!("recording transport asked to panic");
        }
        let mut state = self.state.lock();
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            false
        } else {
            true
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.closes += 1;
        match &state.close_error {
            Some(reason) => Err(TransportError::Close(reason.clone())),
            None => Ok(()),
        }
    }
}
