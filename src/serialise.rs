//! Batch serialisation for the collector payload.
//!
//! The wire payload is a JSON array with one object per event. Each object
//! borrows from the buffered [`LogEvent`] so only the timestamp is formatted
//! into a fresh string.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::log_event::{Batch, LogEvent};

/// Errors raised while turning a batch into a payload.
#[derive(Debug, Error)]
pub enum SerialiseError {
    #[error("failed to encode batch as JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Raised by custom serialisers.
    #[error("failed to serialise batch: {0}")]
    Custom(String),
}

/// Converts a batch of events into a wire payload.
///
/// Implementations must accept an empty batch.
pub trait Serialiser: Send {
    fn marshal(&self, batch: &Batch) -> Result<String, SerialiseError>;
}

#[derive(Serialize)]
struct WireEvent<'a> {
    timestamp: String,
    level: &'static str,
    category: &'a str,
    message: &'a str,
    #[serde(rename = "threadName", skip_serializing_if = "Option::is_none")]
    thread_name: Option<&'a str>,
    properties: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a LogEvent> for WireEvent<'a> {
    fn from(event: &'a LogEvent) -> Self {
        let timestamp: DateTime<Utc> = event.timestamp.into();
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level: event.level.as_str(),
            category: &event.logger,
            message: &event.message,
            thread_name: event.thread_name.as_deref(),
            properties: &event.properties,
        }
    }
}

/// Serialiser producing the JSON array expected by the collector.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerialiser;

impl Serialiser for JsonSerialiser {
    fn marshal(&self, batch: &Batch) -> Result<String, SerialiseError> {
        let wire: Vec<WireEvent<'_>> = batch.iter().map(WireEvent::from).collect();
        Ok(serde_json::to_string(&wire)?)
    }
}
