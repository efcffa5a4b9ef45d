//! HTTP transport boundary.
//!
//! [`Transport`] is the minimal async seam between the executor and the
//! network, so tests can substitute deterministic mocks without sockets.
//! The production implementation, [`HttpTransport`], wraps `reqwest` and
//! maps its failures onto the fixed [`TransportCode`] vocabulary the
//! classifier understands.

use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::request::{Method, PreparedRequest};

/// Fixed vocabulary of transport-level failure shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    ConnectionRefused,
    ConnectTimeout,
    OperationTimeout,
    TlsHandshake,
    TlsCertificate,
    Other,
}

/// A failure below the HTTP layer: no response was received.
#[derive(Debug)]
pub struct TransportError {
    pub code: TransportCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport failure ({:?}): {}", self.code, self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(code_for(&err), err.to_string())
    }
}

/// Map a reqwest failure onto the transport vocabulary.
///
/// reqwest does not expose TLS failure detail through a stable API, so TLS
/// shapes are recognized from the error's source chain text. The fallback
/// (`Other`) classifies as fatal, which is the conservative outcome.
fn code_for(err: &reqwest::Error) -> TransportCode {
    if err.is_timeout() {
        if err.is_connect() {
            return TransportCode::ConnectTimeout;
        }
        return TransportCode::OperationTimeout;
    }

    let chain_text = {
        let mut parts = vec![err.to_string()];
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            parts.push(cause.to_string());
            source = cause.source();
        }
        parts.join(": ").to_ascii_lowercase()
    };

    if chain_text.contains("certificate") {
        return TransportCode::TlsCertificate;
    }
    if chain_text.contains("tls") || chain_text.contains("ssl") || chain_text.contains("handshake")
    {
        return TransportCode::TlsHandshake;
    }
    if err.is_connect() {
        return TransportCode::ConnectionRefused;
    }
    TransportCode::Other
}

/// One received HTTP response, unparsed.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one prepared request and returns the raw outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport over a shared `reqwest` client.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build with a per-attempt timeout. Falls back to reqwest defaults if
    /// the builder fails for any reason.
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut outbound = self.http.request(method, request.url.clone());
        for (key, value) in &request.headers {
            outbound = outbound.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            outbound = outbound.body(body.clone());
        }

        let response = outbound.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(key, value)| {
                (
                    key.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Parse a `Retry-After` header value: delta-seconds or an HTTP-date.
pub(crate) fn parse_retry_after_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let when = httpdate::parse_http_date(value).ok()?;
    when.duration_since(SystemTime::now())
        .ok()
        .map(|delta| delta.as_secs())
}
