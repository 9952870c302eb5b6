//! Delivery of serialised batches to the collector.
//!
//! [`HttpTransport`] keeps a `ureq::Agent` for connection pooling and POSTs
//! each payload as `application/json`. Delivery failures are reported as
//! `false` rather than errors; the appender's backoff handles the retry.
//!
//! # Response classification
//!
//! - **2xx**: accepted.
//! - **any other status**: rejected, logged with the status code.
//! - **network errors**: rejected, logged with the transport error.

use std::{collections::HashMap, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use log::warn;
use native_tls::TlsConnector;
use thiserror::Error;
use ureq::{Agent, AgentBuilder};
use url::Url;

use crate::config::BuildError;

/// Default connection timeout applied when establishing HTTP connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for a whole request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raised when a transport cannot release its resources cleanly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to close transport: {0}")]
    Close(String),
}

/// Delivers payloads to the collector.
pub trait Transport: Send {
    /// Deliver `payload`; `true` when the collector accepted it.
    fn send(&mut self, payload: &str) -> bool;

    /// Release held connections. Later sends must return `false`.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Authentication configuration for HTTP requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthConfig {
    #[default]
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// Connection settings for [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub auth: AuthConfig,
    /// Additional headers sent with every request.
    pub headers: HashMap<String, String>,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auth: AuthConfig::default(),
            headers: HashMap::new(),
            insecure_skip_verify: false,
        }
    }
}

/// Classification of an HTTP status for delivery accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Accepted,
    Rejected,
}

pub(crate) fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Accepted,
        _ => ResponseClass::Rejected,
    }
}

/// Parse and check a collector address.
///
/// Only absolute `http` and `https` URLs with a host are accepted.
pub fn validate_address(address: &str) -> Result<Url, BuildError> {
    let invalid = |reason: String| BuildError::InvalidAddress {
        address: address.to_owned(),
        reason,
    };
    let url = Url::parse(address.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// Transport POSTing JSON payloads over HTTP(S).
pub struct HttpTransport {
    url: Url,
    agent: Option<Agent>,
    options: TransportOptions,
}

impl HttpTransport {
    /// Build a transport for `address`, failing fast on a malformed URL or TLS
    /// setup error.
    pub fn new(address: &str, options: TransportOptions) -> Result<Self, BuildError> {
        let url = validate_address(address)?;
        let mut tls = TlsConnector::builder();
        if options.insecure_skip_verify {
            tls.danger_accept_invalid_certs(true);
            tls.danger_accept_invalid_hostnames(true);
        }
        let connector = tls.build().map_err(|err| BuildError::Tls(err.to_string()))?;
        let agent = AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout(options.request_timeout)
            .tls_connector(Arc::new(connector))
            .build();
        Ok(Self {
            url,
            agent: Some(agent),
            options,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn post(&self, agent: &Agent, payload: &str) -> Result<ureq::Response, Box<ureq::Error>> {
        let mut req = agent
            .request_url("POST", &self.url)
            .set("Content-Type", "application/json");
        req = self.apply_auth(req);
        for (key, value) in &self.options.headers {
            req = req.set(key, value);
        }
        req.send_string(payload).map_err(Box::new)
    }

    fn apply_auth(&self, req: ureq::Request) -> ureq::Request {
        match &self.options.auth {
            AuthConfig::None => req,
            AuthConfig::Basic { username, password } => {
                let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
                req.set("Authorization", &format!("Basic {encoded}"))
            }
            AuthConfig::Bearer { token } => req.set("Authorization", &format!("Bearer {token}")),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, payload: &str) -> bool {
        let Some(agent) = self.agent.as_ref() else {
            warn!("HttpAppender transport is closed; batch not sent");
            return false;
        };
        match self.post(agent, payload) {
            Ok(response) => {
                let status = response.status();
                // Drain the body so the connection can return to the pool.
                let _ = response.into_string();
                match classify_status(status) {
                    ResponseClass::Accepted => true,
                    ResponseClass::Rejected => {
                        warn!("HttpAppender collector answered {status}; batch not accepted");
                        false
                    }
                }
            }
            Err(err) => match *err {
                ureq::Error::Status(code, _) => {
                    warn!("HttpAppender collector rejected batch with status {code}");
                    false
                }
                ureq::Error::Transport(transport) => {
                    warn!("HttpAppender failed to reach {}: {transport}", self.url);
                    false
                }
            },
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.agent = None;
        Ok(())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url.as_str())
            .field("closed", &self.agent.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, ResponseClass::Accepted)]
    #[case(202, ResponseClass::Accepted)]
    #[case(204, ResponseClass::Accepted)]
    #[case(302, ResponseClass::Rejected)]
    #[case(400, ResponseClass::Rejected)]
    #[case(429, ResponseClass::Rejected)]
    #[case(503, ResponseClass::Rejected)]
    fn status_classification(#[case] status: u16, #[case] expected: ResponseClass) {
        assert_eq!(classify_status(status), expected);
    }

    #[rstest]
    #[case("http://localhost:9999/json")]
    #[case("https://collector.example.com/v1/logs")]
    fn accepts_http_addresses(#[case] address: &str) {
        assert!(validate_address(address).is_ok());
    }

    #[rstest]
    #[case("not a url")]
    #[case("ftp://collector.example.com/")]
    #[case("localhost:9999")]
    #[case("")]
    fn rejects_malformed_addresses(#[case] address: &str) {
        let err = validate_address(address).expect_err("address must be rejected");
        assert!(matches!(err, BuildError::InvalidAddress { .. }));
    }

    #[test]
    fn closed_transport_refuses_to_send() {
        let mut transport =
            HttpTransport::new("http://127.0.0.1:9/json", TransportOptions::default())
                .expect("valid address");
        transport.close().expect("close");
        assert!(!transport.send("[]"));
        transport.close().expect("second close");
    }
}
