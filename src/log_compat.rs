//! Bridge from the Rust `log` crate.
//!
//! [`HttpAppender`] implements `log::Log`, so it can receive events from any
//! crate logging through the facade. [`install`] stores the appender in a
//! process-wide slot and registers it as the global logger; [`shutdown`] is the
//! exit hook that makes the final flush. Rust runs no destructors for statics,
//! so the host must call [`shutdown`] before the process exits (for example at
//! the end of `main` or from a signal handler).
//!
//! Records emitted from inside this crate are ignored. The appender reports its
//! own failures through `log`, and feeding those back into the buffer would
//! loop. For the same reason records raised while a batch is being delivered,
//! such as the HTTP client's own diagnostics, are ignored as well.

use log::{LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::appender::{HttpAppender, delivering_on_this_thread};
use crate::level::Level;
use crate::log_event::LogEvent;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

static GLOBAL_APPENDER: OnceCell<HttpAppender> = OnceCell::new();

/// Errors raised while installing the global appender.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("an appender is already installed")]
    AlreadyInstalled,
    #[error("a different global logger is already set")]
    LoggerAlreadySet,
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn normalise_target(target: &str) -> String {
    target.replace("::", ".")
}

/// Convert a `log` record into an event, keeping its source location as
/// properties.
pub fn event_from_record(record: &Record<'_>) -> LogEvent {
    let mut event = LogEvent::new(
        &normalise_target(record.target()),
        Level::from(record.level()),
        &record.args().to_string(),
    );
    if let Some(module) = record.module_path() {
        event.properties.insert("module".into(), module.to_owned());
    }
    if let Some(file) = record.file() {
        event.properties.insert("file".into(), file.to_owned());
    }
    if let Some(line) = record.line() {
        event.properties.insert("line".into(), line.to_string());
    }
    event
}

impl log::Log for HttpAppender {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        !is_own_target(metadata.target())
            && !delivering_on_this_thread()
            && Level::from(metadata.level()) >= self.threshold()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.append(event_from_record(record));
    }

    fn flush(&self) {
        HttpAppender::flush(self);
    }
}

/// Install `appender` as the global `log` logger.
///
/// The appender lives for the rest of the process; call [`shutdown`] before
/// exit to flush it.
pub fn install(
    appender: HttpAppender,
    max_level: LevelFilter,
) -> Result<&'static HttpAppender, InstallError> {
    GLOBAL_APPENDER
        .set(appender)
        .map_err(|_| InstallError::AlreadyInstalled)?;
    let installed = GLOBAL_APPENDER
        .get()
        .ok_or(InstallError::AlreadyInstalled)?;
    log::set_logger(installed).map_err(|_| InstallError::LoggerAlreadySet)?;
    log::set_max_level(max_level);
    Ok(installed)
}

/// The installed appender, if any.
pub fn installed() -> Option<&'static HttpAppender> {
    GLOBAL_APPENDER.get()
}

/// Flush and close the installed appender.
///
/// Safe to call more than once and when nothing is installed.
pub fn shutdown() {
    if let Some(appender) = GLOBAL_APPENDER.get() {
        appender.close();
    }
}
