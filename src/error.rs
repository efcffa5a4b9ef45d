//! Unified error types for the client.

use std::fmt;

use crate::request::Method;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// How a classified failure should be handled.
///
/// The kind is decided once, inside the request executor, and drives the
/// retry loop: only [`ErrorKind::Transient`] and [`ErrorKind::WaitAndRetry`]
/// are ever retried. Everything else surfaces to the caller immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network/server hiccup or a safely retriable auth conflict (used OAuth1
    /// nonce, bad gateway). Retried up to the configured bound.
    Transient,
    /// Rate limited (HTTP 429). Retried like `Transient`; the server's
    /// `Retry-After` header is honored when the retry policy allows it.
    WaitAndRetry,
    /// A create/update conflicted with an existing resource (`term_exists`).
    ItemExists,
    /// The target resource is absent (404) or permanently gone (410).
    ItemNotFound,
    /// The server returned a body that could not be parsed where structured
    /// data was expected. Not retried; indicates a contract violation.
    IllegalResponse,
    /// Non-recoverable failure. Surfaced immediately, never retried.
    Fatal,
}

impl ErrorKind {
    /// True when the executor may schedule another attempt for this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::WaitAndRetry)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "transient",
            Self::WaitAndRetry => "wait-and-retry",
            Self::ItemExists => "item-exists",
            Self::ItemNotFound => "item-not-found",
            Self::IllegalResponse => "illegal-response",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// A classified API failure.
///
/// Every terminal failure path of the executor produces exactly one of
/// these. The offending method and URL are attached for diagnosability; when
/// retries were exhausted the error is the *last* classified failure, not a
/// generic timeout.
#[derive(Debug)]
pub struct ApiError {
    /// Classification driving retry/surface behavior.
    pub kind: ErrorKind,
    /// HTTP status code, when the failure came from a response.
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
    /// HTTP method of the failing request, when known.
    pub method: Option<Method>,
    /// Full URL of the failing request, when known.
    pub url: Option<String>,
    /// Server-supplied `Retry-After` delay in seconds, when present.
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Create a classified error with no status/request context yet.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            method: None,
            url: None,
            retry_after_secs: None,
        }
    }

    /// Shorthand for a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// Shorthand for an illegal-response error.
    pub fn illegal_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalResponse, message)
    }

    /// Attach the HTTP status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the failing request's method and URL.
    pub fn with_request(mut self, method: Method, url: impl Into<String>) -> Self {
        self.method = Some(method);
        self.url = Some(url.into());
        self
    }

    /// Attach the parsed `Retry-After` delay.
    pub fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        self.retry_after_secs = secs;
        self
    }

    /// True when the executor may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "API error (HTTP {status}, {}): {}", self.kind, self.message)?,
            None => write!(f, "API error ({}): {}", self.kind, self.message)?,
        }
        if let (Some(method), Some(url)) = (self.method, self.url.as_deref()) {
            write!(f, " [{method} {url}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or validating client configuration.
///
/// Raised at construction time, before any network activity.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}
