//! Failure classification for transport and HTTP status outcomes.
//!
//! Pure mappings, no state. Status codes alone are not enough: 401 and 500
//! need the decoded body to tell recoverable sub-cases (used OAuth1 nonce,
//! `term_exists` conflict) apart from real failures, so both classifiers
//! take the decoded body when one exists.

use serde_json::Value;

use crate::error::ErrorKind;
use crate::request::Method;
use crate::transport::TransportCode;

/// Map a transport-level failure onto the taxonomy.
///
/// The transient set is a fixed allow-list: connection refused, connect
/// timeout, operation timeout, and both TLS failure shapes. Anything else is
/// fatal.
pub fn classify_transport(code: TransportCode) -> ErrorKind {
    match code {
        TransportCode::ConnectionRefused
        | TransportCode::ConnectTimeout
        | TransportCode::OperationTimeout
        | TransportCode::TlsHandshake
        | TransportCode::TlsCertificate => ErrorKind::Transient,
        TransportCode::Other => ErrorKind::Fatal,
    }
}

fn body_code<'a>(body: Option<&'a Value>) -> Option<&'a str> {
    body?.get("code")?.as_str()
}

fn body_message<'a>(body: Option<&'a Value>) -> Option<&'a str> {
    body?.get("message")?.as_str()
}

/// Map an error response status (plus decoded body, when it decoded) onto
/// the taxonomy.
pub fn classify_status(status: u16, body: Option<&Value>) -> ErrorKind {
    match status {
        304 => ErrorKind::Fatal,
        400 => ErrorKind::Fatal,
        // A collided OAuth1 nonce is safe to retry with a fresh signature.
        401 if body_code(body) == Some("json_oauth1_nonce_already_used") => ErrorKind::Transient,
        401 => ErrorKind::Fatal,
        403 => ErrorKind::Fatal,
        404 => ErrorKind::ItemNotFound,
        405 => ErrorKind::Fatal,
        410 => ErrorKind::ItemNotFound,
        415 => ErrorKind::Fatal,
        429 => ErrorKind::WaitAndRetry,
        500 if body_code(body) == Some("term_exists") => ErrorKind::ItemExists,
        500 => ErrorKind::Fatal,
        501 => ErrorKind::Fatal,
        502 => ErrorKind::Transient,
        _ => ErrorKind::Fatal,
    }
}

fn bad_request_params(body: Option<&Value>) -> Vec<String> {
    let Some(params) = body.and_then(|b| b.get("data")).and_then(|d| d.get("params")) else {
        return Vec::new();
    };
    let values: Vec<&Value> = match params {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };
    values
        .into_iter()
        .map(|v| match v {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Human-readable message for an error response.
///
/// `raw` is the undecoded body text, used as a fallback when the body did
/// not decode or carries no message field.
pub fn status_message(status: u16, body: Option<&Value>, raw: &str, method: Method) -> String {
    match status {
        304 => "Not Modified.".to_string(),
        400 => format!(
            "Bad Request {} Params: {}",
            body_message(body).unwrap_or("unknown"),
            bad_request_params(body).join(" | ")
        ),
        401 if body_code(body) == Some("json_oauth1_nonce_already_used") => {
            body_message(body).unwrap_or(raw).to_string()
        }
        401 => format!("Unauthorized: {}", body_message(body).unwrap_or(raw)),
        403 => "Forbidden: request not allowed.".to_string(),
        404 => "Not found: URL does not exist.".to_string(),
        405 => format!("Method Not Allowed: incorrect HTTP method {method} provided."),
        410 => "Gone: URL has moved.".to_string(),
        415 => format!("Unsupported Media Type (incorrect HTTP method {method} provided)."),
        429 => "Too many requests: client is rate limited.".to_string(),
        500 if body_code(body) == Some("term_exists") => body_message(body)
            .unwrap_or("Internal server error.")
            .to_string(),
        500 => {
            let lead = match body_code(body) {
                Some(code) => format!("{code} => {}", body_message(body).unwrap_or_default()),
                None => raw.to_string(),
            };
            let data = body
                .and_then(|b| b.get("data"))
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            format!("Internal server error: {lead}{data}")
        }
        501 => "Not Implemented.".to_string(),
        502 => "Bad Gateway: server has an issue.".to_string(),
        _ => format!("Status code {status} returned."),
    }
}
