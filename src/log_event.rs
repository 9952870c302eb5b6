//! Log event representation handed to the appender.
//!
//! A [`LogEvent`] is immutable from the caller's point of view once appended;
//! the appender only ever adds the `hostname` property before buffering it.
//! Events are grouped into a [`Batch`] when the buffer is drained.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::SystemTime;

use crate::level::Level;

/// Property injected into every event that does not already carry one.
pub const HOSTNAME_PROPERTY: &str = "hostname";

#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    /// Time the event was created.
    pub timestamp: SystemTime,
    /// Severity of the event.
    pub level: Level,
    /// Name of the logger (category) that produced the event.
    pub logger: String,
    /// The rendered message.
    pub message: String,
    /// Name of the thread that created the event, if it has one.
    pub thread_name: Option<String>,
    /// Structured properties; keys are unique.
    pub properties: BTreeMap<String, String>,
}

impl LogEvent {
    /// Construct an event stamped with the current time and thread.
    pub fn new(logger: &str, level: Level, message: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            level,
            logger: logger.to_owned(),
            message: message.to_owned(),
            thread_name: thread::current().name().map(ToString::to_string),
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property, replacing any previous value for `key`.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Override the creation timestamp.
    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Look up a property by name.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Insert the hostname unless the event already names one.
    pub(crate) fn inject_hostname(&mut self, hostname: &str) {
        self.properties
            .entry(HOSTNAME_PROPERTY.to_owned())
            .or_insert_with(|| hostname.to_owned());
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}

/// Ordered snapshot of events taken from the buffer by one drain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    events: Vec<LogEvent>,
}

impl Batch {
    pub fn new(events: Vec<LogEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEvent> {
        self.events.iter()
    }

}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a LogEvent;
    type IntoIter = std::slice::Iter<'a, LogEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_injected_when_missing() {
        let mut event = LogEvent::new("app", Level::Info, "hello");
        event.inject_hostname("box-1");
        assert_eq!(event.property(HOSTNAME_PROPERTY), Some("box-1"));
    }

    #[test]
    fn existing_hostname_is_preserved() {
        let mut event =
            LogEvent::new("app", Level::Info, "hello").with_property(HOSTNAME_PROPERTY, "edge-7");
        event.inject_hostname("box-1");
        assert_eq!(event.property(HOSTNAME_PROPERTY), Some("edge-7"));
    }

    #[test]
    fn display_shows_level_and_message() {
        let event = LogEvent::new("app", Level::Warn, "disk nearly full");
        assert_eq!(event.to_string(), "WARN - disk nearly full");
    }
}
