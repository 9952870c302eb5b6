//! INI configuration for the appender.
//!
//! Options live in an `[appender]` section, or in the root section when no
//! such section exists. Keys are case-insensitive and ignore `_` and `-`, so
//! both `buffer_size` and `BufferSize` are accepted:
//!
//! ```ini
//! [appender]
//! address = http://localhost:9999/json
//! buffer_size = 500
//! flush_interval = 2000
//! threshold = INFO
//! max_backoff = none
//! header.X-Team = payments
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use ini::{Ini, Properties};

use crate::config::{AppenderBuilder, BuildError};
use crate::level::Level;

const SECTION: &str = "appender";
const HEADER_PREFIX: &str = "header.";

impl AppenderBuilder {
    /// Load builder options from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let text = read_file(path)?;
        if text.trim().is_empty() {
            return Err(BuildError::InvalidConfig(format!(
                "{} is an empty file",
                path.display()
            )));
        }
        Self::from_ini_str(&text)
    }

    /// Load builder options from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, BuildError> {
        let ini = Ini::load_from_str(text)?;
        let props = ini
            .section(Some(SECTION))
            .unwrap_or_else(|| ini.general_section());
        apply_properties(AppenderBuilder::new(), props)
    }
}

fn read_file(path: &Path) -> Result<String, BuildError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) => match err.kind() {
            ErrorKind::NotFound => Err(BuildError::InvalidConfig(format!(
                "{} doesn't exist",
                path.display()
            ))),
            _ => Err(BuildError::Io(err)),
        },
    }
}

fn normalise_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Header name for `header.<Name>` keys.
fn header_name(key: &str) -> Option<&str> {
    let prefix = key.get(..HEADER_PREFIX.len())?;
    let name = &key[HEADER_PREFIX.len()..];
    (prefix.eq_ignore_ascii_case(HEADER_PREFIX) && !name.is_empty()).then_some(name)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, BuildError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| BuildError::InvalidConfig(format!("invalid value {value:?} for {key}: {err}")))
}

fn parse_max_backoff(key: &str, value: &str) -> Result<Option<u64>, BuildError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" | "unbounded" | "0" => Ok(None),
        _ => parse_value(key, value).map(Some),
    }
}

fn apply_properties(
    mut builder: AppenderBuilder,
    props: &Properties,
) -> Result<AppenderBuilder, BuildError> {
    let mut username = None;
    let mut password = None;
    for (key, value) in props.iter() {
        if let Some(name) = header_name(key) {
            builder = builder.with_header(name, value.trim());
            continue;
        }
        builder = match normalise_key(key).as_str() {
            "address" | "url" => builder.with_address(value.trim()),
            "buffersize" => builder.with_buffer_size(parse_value(key, value)?),
            "flushinterval" => builder.with_flush_interval_ms(parse_value(key, value)?),
            "threshold" | "level" => builder.with_threshold(parse_value::<Level>(key, value)?),
            "initialbackoff" => builder.with_initial_backoff_secs(parse_value(key, value)?),
            "maxbackoff" => builder.with_max_backoff_secs(parse_max_backoff(key, value)?),
            "connecttimeout" => builder.with_connect_timeout_ms(parse_value(key, value)?),
            "requesttimeout" => builder.with_request_timeout_ms(parse_value(key, value)?),
            "hostname" => builder.with_hostname(value.trim()),
            "bearertoken" => builder.with_bearer_token(value.trim()),
            "insecureskipverify" => builder.with_insecure_skip_verify(parse_value(key, value)?),
            "username" => {
                username = Some(value.trim().to_owned());
                builder
            }
            "password" => {
                password = Some(value.to_owned());
                builder
            }
            _ => {
                return Err(BuildError::InvalidConfig(format!(
                    "unknown appender option {key:?}"
                )));
            }
        };
    }
    match (username, password) {
        (Some(user), Some(pass)) => Ok(builder.with_basic_auth(user, pass)),
        (None, None) => Ok(builder),
        _ => Err(BuildError::InvalidConfig(
            "username and password must be set together".into(),
        )),
    }
}
