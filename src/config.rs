//! Appender configuration and activation.
//!
//! [`AppenderBuilder`] collects the options a host sets before activation and
//! validates them in [`AppenderBuilder::build`]. A missing or malformed
//! collector address is reported immediately rather than on first use.

use std::{collections::HashMap, io, time::Duration};

use log::warn;
use thiserror::Error;

use crate::{
    appender::HttpAppender,
    backoff::BackoffPolicy,
    buffer::BufferPolicy,
    clock::{TimeProvider, system_time_provider},
    level::Level,
    serialise::{JsonSerialiser, Serialiser},
    transport::{AuthConfig, HttpTransport, Transport, TransportOptions, validate_address},
};

/// Errors that may occur while activating an appender.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid appender configuration: {0}")]
    InvalidConfig(String),
    /// The collector address could not be used.
    #[error("invalid collector address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    /// TLS connector construction failed.
    #[error("failed to initialise TLS: {0}")]
    Tls(String),
    /// Underlying I/O error whilst reading configuration.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Malformed INI configuration.
    #[error("invalid configuration file: {0}")]
    Ini(#[from] ini::ParseError),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Validated configuration consumed by [`HttpAppender`].
#[derive(Clone, Debug)]
pub struct AppenderConfig {
    /// Collector URL.
    pub address: String,
    pub buffer: BufferPolicy,
    pub backoff: BackoffPolicy,
    /// Events below this level are ignored.
    pub threshold: Level,
    /// Injected as the `hostname` property; `None` disables injection.
    pub hostname: Option<String>,
    pub transport: TransportOptions,
}

/// Builder for constructing [`HttpAppender`] instances.
#[derive(Clone, Debug, Default)]
pub struct AppenderBuilder {
    address: Option<String>,
    buffer_size: Option<usize>,
    flush_interval_ms: Option<u64>,
    threshold: Option<Level>,
    initial_backoff_secs: Option<u64>,
    max_backoff_secs: Option<Option<u64>>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    hostname: Option<String>,
    auth: Option<AuthConfig>,
    headers: HashMap<String, String>,
    insecure_skip_verify: bool,
}

impl AppenderBuilder {
    /// Create a new builder with no address configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collector URL (required).
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    option_setter!(
        #[doc = "Set the number of buffered events that triggers a flush."]
        with_buffer_size,
        buffer_size,
        usize
    );
    option_setter!(
        #[doc = "Set the maximum batch age in milliseconds."]
        with_flush_interval_ms,
        flush_interval_ms,
        u64
    );
    option_setter!(
        #[doc = "Ignore events below this level."]
        with_threshold,
        threshold,
        Level
    );
    option_setter!(
        #[doc = "Set the backoff applied after the first failure, in seconds."]
        with_initial_backoff_secs,
        initial_backoff_secs,
        u64
    );
    option_setter!(
        #[doc = "Set the connect timeout in milliseconds."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the request timeout in milliseconds."]
        with_request_timeout_ms,
        request_timeout_ms,
        u64
    );

    /// Cap the backoff interval; `None` lets it double without limit.
    pub fn with_max_backoff_secs(mut self, value: Option<u64>) -> Self {
        self.max_backoff_secs = Some(value);
        self
    }

    /// Use a fixed hostname instead of resolving the local one.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Configure HTTP Basic authentication.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = Some(AuthConfig::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Configure Bearer token authentication.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig::Bearer {
            token: token.into(),
        });
        self
    }

    /// Add a single custom HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Accept invalid TLS certificates. Only for tests.
    pub fn with_insecure_skip_verify(mut self, value: bool) -> Self {
        self.insecure_skip_verify = value;
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_address()?;
        if let Some(size) = self.buffer_size {
            ensure_positive!(size, "buffer_size")?;
        }
        if let Some(interval) = self.flush_interval_ms {
            ensure_positive!(interval, "flush_interval_ms")?;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.request_timeout_ms {
            ensure_positive!(timeout, "request_timeout_ms")?;
        }
        self.validate_headers()?;
        self.validate_backoff()
    }

    fn validate_headers(&self) -> Result<(), BuildError> {
        for (name, value) in &self.headers {
            if !is_header_token(name) {
                return Err(BuildError::InvalidConfig(format!(
                    "invalid header name {name:?}"
                )));
            }
            if value.chars().any(|c| c.is_control() && c != '\t') {
                return Err(BuildError::InvalidConfig(format!(
                    "invalid value for header {name:?}"
                )));
            }
        }
        Ok(())
    }

    fn validate_address(&self) -> Result<(), BuildError> {
        match &self.address {
            None => Err(BuildError::InvalidConfig(
                "appender requires an address".into(),
            )),
            Some(address) => validate_address(address).map(|_| ()),
        }
    }

    fn validate_backoff(&self) -> Result<(), BuildError> {
        let initial = match self.initial_backoff_secs {
            Some(value) => ensure_positive!(value, "initial_backoff_secs")?,
            None => BackoffPolicy::default().initial_secs,
        };
        match self.max_backoff_secs {
            Some(Some(max)) if max < initial => Err(BuildError::InvalidConfig(format!(
                "max_backoff_secs ({max}) must not be below initial_backoff_secs ({initial})"
            ))),
            _ => Ok(()),
        }
    }

    /// Validate the options and resolve defaults.
    pub fn build_config(&self) -> Result<AppenderConfig, BuildError> {
        self.validate()?;

        let buffer_defaults = BufferPolicy::default();
        let backoff_defaults = BackoffPolicy::default();
        let transport_defaults = TransportOptions::default();
        Ok(AppenderConfig {
            address: self.address.clone().unwrap_or_default().trim().to_owned(),
            buffer: BufferPolicy {
                max_batch_size: self.buffer_size.unwrap_or(buffer_defaults.max_batch_size),
                max_batch_age_millis: self
                    .flush_interval_ms
                    .unwrap_or(buffer_defaults.max_batch_age_millis),
            },
            backoff: BackoffPolicy {
                initial_secs: self
                    .initial_backoff_secs
                    .unwrap_or(backoff_defaults.initial_secs),
                max_secs: self.max_backoff_secs.unwrap_or(backoff_defaults.max_secs),
            },
            threshold: self.threshold.unwrap_or(Level::Trace),
            hostname: self.hostname.clone().or_else(local_hostname),
            transport: TransportOptions {
                connect_timeout: self
                    .connect_timeout_ms
                    .map_or(transport_defaults.connect_timeout, Duration::from_millis),
                request_timeout: self
                    .request_timeout_ms
                    .map_or(transport_defaults.request_timeout, Duration::from_millis),
                auth: self.auth.clone().unwrap_or_default(),
                headers: self.headers.clone(),
                insecure_skip_verify: self.insecure_skip_verify,
            },
        })
    }

    /// Activate an appender delivering over HTTP.
    pub fn build(&self) -> Result<HttpAppender, BuildError> {
        let config = self.build_config()?;
        let transport = HttpTransport::new(&config.address, config.transport.clone())?;
        Ok(HttpAppender::from_parts(
            config,
            Box::new(JsonSerialiser),
            Box::new(transport),
            system_time_provider(),
        ))
    }

    /// Activate an appender that delivers through a caller-supplied transport.
    pub fn build_with_transport(
        &self,
        transport: Box<dyn Transport>,
        clock: TimeProvider,
    ) -> Result<HttpAppender, BuildError> {
        self.build_with_parts(Box::new(JsonSerialiser), transport, clock)
    }

    /// Activate an appender from caller-supplied collaborators.
    pub fn build_with_parts(
        &self,
        serialiser: Box<dyn Serialiser>,
        transport: Box<dyn Transport>,
        clock: TimeProvider,
    ) -> Result<HttpAppender, BuildError> {
        let config = self.build_config()?;
        Ok(HttpAppender::from_parts(config, serialiser, transport, clock))
    }
}

/// RFC 7230 `token`: the only shape the HTTP client accepts as a header name.
fn is_header_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn local_hostname() -> Option<String> {
    match hostname::get() {
        Ok(name) => match name.into_string() {
            Ok(name) => Some(name),
            Err(raw) => {
                warn!("HttpAppender could not set hostname: {raw:?} is not valid UTF-8");
                None
            }
        },
        Err(err) => {
            warn!("HttpAppender could not set hostname: {err}");
            None
        }
    }
}
