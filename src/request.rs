//! Request model and authenticated request preparation.
//!
//! An [`ApiRequest`] is the logical description of one operation (method,
//! endpoint-relative path, ordered parameters, optional raw body). The
//! [`RequestBuilder`] turns it into a [`PreparedRequest`] (full URL, encoded
//! query, headers including `Authorization`) once per send attempt, so
//! signers that need per-attempt freshness (OAuth1 nonces) get it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::auth::Signer;
use crate::error::ApiError;

/// HTTP methods used by the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical API operation, before authentication and encoding.
///
/// `params` ride in the query string for GET/DELETE and in a JSON object
/// body otherwise. `raw_body` (uploads) takes precedence over `params`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Endpoint-relative resource path; full URLs are accepted and stripped.
    pub path: String,
    /// Ordered request parameters.
    pub params: BTreeMap<String, Value>,
    /// Verbatim request body for uploads.
    pub raw_body: Option<Vec<u8>>,
    /// Extra headers (content-disposition/content-type for uploads).
    pub headers: BTreeMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            raw_body: None,
            headers: BTreeMap::new(),
        }
    }
}

/// One fully prepared send attempt. Immutable; rebuilt for every retry.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Full URL including the encoded query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

// RFC 3986 unreserved characters stay literal; everything else is encoded.
// OAuth1 signature bases require exactly this set.
const STRICT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, STRICT_ENCODE_SET).to_string()
}

/// Strip a leading occurrence of the endpoint URL and any leading slash, so
/// callers may pass either a bare resource path or a full URL.
///
/// Idempotent: normalizing an already-relative path is a no-op.
pub fn normalize_path(endpoint: &str, path: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    let mut rest = path;
    if !endpoint.is_empty() {
        if let Some(stripped) = rest.strip_prefix(endpoint) {
            rest = stripped;
        }
    }
    rest.trim_start_matches('/').to_string()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
}

/// Builds authenticated, fully encoded requests against one endpoint.
pub struct RequestBuilder {
    endpoint: String,
    signer: Arc<dyn Signer>,
}

impl RequestBuilder {
    /// `endpoint` is the API root; a trailing slash is stripped.
    pub fn new(endpoint: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            signer,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Prepare one send attempt: join and normalize the URL, encode query or
    /// JSON body, then ask the signer for the `Authorization` header.
    pub fn prepare(&self, request: &ApiRequest) -> Result<PreparedRequest, ApiError> {
        let path = normalize_path(&self.endpoint, &request.path);
        let base_url = if path.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}/{}", self.endpoint, path)
        };

        let mut query: Vec<(String, String)> = Vec::new();
        if matches!(request.method, Method::Get | Method::Delete) {
            for (key, value) in &request.params {
                query.push((key.clone(), query_value(value)));
            }
        }

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let body = if let Some(raw) = &request.raw_body {
            Some(raw.clone())
        } else if matches!(request.method, Method::Post | Method::Put | Method::Patch) {
            let encoded = serde_json::to_vec(&request.params)
                .map_err(|e| ApiError::fatal(format!("failed to encode request body: {e}")))?;
            if !has_header(&headers, "content-type") {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            Some(encoded)
        } else {
            None
        };

        if !has_header(&headers, "accept") {
            headers.push(("Accept".to_string(), "application/json".to_string()));
        }

        if let Some(value) = self.signer.authorize(request.method, &base_url, &query)? {
            headers.push(("Authorization".to_string(), value));
        }

        let url = if query.is_empty() {
            base_url
        } else {
            let encoded = query
                .iter()
                .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
                .collect::<Vec<_>>()
                .join("&");
            format!("{base_url}?{encoded}")
        };

        Ok(PreparedRequest {
            method: request.method,
            url,
            headers,
            body,
        })
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
