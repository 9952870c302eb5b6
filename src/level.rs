//! Severity levels understood by the appender.
//!
//! Levels are totally ordered so the flush controller can compare an event's
//! severity against [`Level::Error`] when deciding whether to escalate.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Returned when a level name is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(pub String);

impl Level {
    /// Static upper-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Whether events at this level bypass batching and backoff.
    pub fn escalates(self) -> bool {
        self >= Level::Error
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "FATAL" | "CRITICAL" => Ok(Self::Fatal),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("info", Level::Info)]
    #[case("WARNING", Level::Warn)]
    #[case(" error ", Level::Error)]
    #[case("critical", Level::Fatal)]
    fn parses_level_names(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(input.parse::<Level>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "verbose".parse::<Level>().expect_err("unknown level");
        assert_eq!(err, ParseLevelError("verbose".into()));
    }

    #[rstest]
    #[case(Level::Warn, false)]
    #[case(Level::Error, true)]
    #[case(Level::Fatal, true)]
    fn escalation_starts_at_error(#[case] level: Level, #[case] expected: bool) {
        assert_eq!(level.escalates(), expected);
    }

    #[rstest]
    #[case(log::Level::Trace, Level::Trace)]
    #[case(log::Level::Info, Level::Info)]
    #[case(log::Level::Error, Level::Error)]
    fn maps_log_crate_levels(#[case] level: log::Level, #[case] expected: Level) {
        assert_eq!(Level::from(level), expected);
    }
}
