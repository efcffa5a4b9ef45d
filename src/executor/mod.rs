//! Request execution engine.
//!
//! One `execute()` call is one logical operation: a bounded loop that
//! prepares, sends, and classifies each attempt. Requests are re-prepared
//! (and re-signed) for every attempt, only retryable kinds loop, and the
//! loop runs at most `max_retry_attempts + 1` sends. Exhausting the bound
//! surfaces the last classified error, never a generic timeout.

mod retry;

pub use retry::{Backoff, RetryPolicy, DEFAULT_MAX_RETRY_ATTEMPTS};

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::classify::{classify_status, classify_transport, status_message};
use crate::error::ApiError;
use crate::request::{ApiRequest, RequestBuilder};
use crate::transport::{parse_retry_after_secs, RawResponse, Transport};

/// Outcome of a successful operation.
///
/// The body is kept raw; `as_array`/`as_object` decode on demand.
#[derive(Debug, Clone)]
pub struct ApiResult {
    status: u16,
    body: String,
    /// `X-WP-Total`, when the server sent it.
    pub total_records: Option<u64>,
    /// `X-WP-TotalPages`, when the server sent it.
    pub total_pages: Option<u64>,
    /// `Allow` header methods, when the server sent them.
    pub allow_methods: Option<Vec<String>>,
}

impl ApiResult {
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw response body text.
    pub fn as_raw(&self) -> &str {
        &self.body
    }

    /// Decode the body as a JSON array.
    pub fn as_array(&self) -> Result<Vec<Value>, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::illegal_response(format!("response is not a JSON array: {e}")))
    }

    /// Decode the body as a JSON value (object form).
    pub fn as_object(&self) -> Result<Value, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::illegal_response(format!("response is not valid JSON: {e}")))
    }
}

fn header_u64(response: &RawResponse, name: &str) -> Option<u64> {
    response.header(name).and_then(|v| v.trim().parse().ok())
}

fn result_from(response: &RawResponse, body: String) -> ApiResult {
    let allow_methods = response.header("allow").map(|value| {
        value
            .split(',')
            .map(|method| method.trim().to_string())
            .filter(|method| !method.is_empty())
            .collect()
    });
    ApiResult {
        status: response.status,
        body,
        total_records: header_u64(response, "x-wp-total"),
        total_pages: header_u64(response, "x-wp-totalpages"),
        allow_methods,
    }
}

/// Drives the retry loop for one operation at a time.
pub struct Executor {
    transport: Box<dyn Transport>,
    builder: RequestBuilder,
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(transport: Box<dyn Transport>, builder: RequestBuilder, policy: RetryPolicy) -> Self {
        Self {
            transport,
            builder,
            policy,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.builder.endpoint()
    }

    /// Replace the retry policy (pacing, bound) for subsequent operations.
    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Prepare a request without sending it. Used by the facade to expose
    /// the last request body.
    pub(crate) fn prepare(&self, request: &ApiRequest) -> Result<crate::request::PreparedRequest, ApiError> {
        self.builder.prepare(request)
    }

    /// Execute one logical operation to completion.
    ///
    /// Dropping the returned future cancels the in-flight attempt; a
    /// cancelled attempt is never retried.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResult, ApiError> {
        let mut retries: u32 = 0;

        loop {
            // Fresh preparation per attempt: OAuth1 signatures need a new
            // nonce and timestamp on every send.
            let prepared = self.builder.prepare(request)?;

            let response = match self.transport.send(&prepared).await {
                Ok(response) => response,
                Err(transport_err) => {
                    let kind = classify_transport(transport_err.code);
                    if kind.is_retryable() && retries < self.policy.max_retry_attempts {
                        retries += 1;
                        debug!(
                            attempt = retries,
                            code = ?transport_err.code,
                            url = %prepared.url,
                            "retrying after transport failure"
                        );
                        if let Some(delay) = self.policy.delay_for(retries, None) {
                            sleep(delay).await;
                        }
                        continue;
                    }
                    if kind.is_retryable() {
                        warn!(retries, url = %prepared.url, "transport retries exhausted");
                    }
                    return Err(ApiError::new(
                        kind,
                        format!("transport error (retried {retries}): {}", transport_err.message),
                    )
                    .with_request(request.method, prepared.url));
                }
            };

            let raw_text = response.text();
            let decoded: Option<Value> = serde_json::from_str(&raw_text).ok();
            let status = response.status;

            if (200..300).contains(&status) {
                // A success body that fails to decode is a contract
                // violation; an empty body (204-style) is not.
                if decoded.is_none() && !raw_text.trim().is_empty() {
                    return Err(ApiError::illegal_response(format!(
                        "Invalid JSON data returned: {raw_text}"
                    ))
                    .with_status(status)
                    .with_request(request.method, prepared.url));
                }
                return Ok(result_from(&response, raw_text));
            }

            // Error response. A body that fails to decode must not abort
            // classification; the raw text becomes the message fallback.
            let kind = classify_status(status, decoded.as_ref());
            let message = status_message(status, decoded.as_ref(), &raw_text, request.method);
            let retry_after = response
                .header("retry-after")
                .and_then(parse_retry_after_secs);
            let err = ApiError::new(kind, message)
                .with_status(status)
                .with_request(request.method, prepared.url)
                .with_retry_after(retry_after);

            if kind.is_retryable() && retries < self.policy.max_retry_attempts {
                retries += 1;
                debug!(
                    attempt = retries,
                    status,
                    kind = %kind,
                    url = err.url.as_deref().unwrap_or_default(),
                    "retrying after error response"
                );
                if let Some(delay) = self.policy.delay_for(retries, Some(&err)) {
                    sleep(delay).await;
                }
                continue;
            }
            if kind.is_retryable() {
                warn!(retries, status, "retries exhausted; surfacing last error");
            }
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{BasicSigner, OAuth1Signer};
    use crate::error::ErrorKind;
    use crate::request::Method;
    use crate::transport::{TransportCode, TransportError};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    const ENDPOINT: &str = "https://example.com/wp-json";

    /// Scripted transport: pops one outcome per send, records every
    /// prepared request it saw.
    struct MockTransport {
        script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        sends: AtomicU32,
        seen: Mutex<Vec<crate::request::PreparedRequest>>,
    }

    impl MockTransport {
        fn new(script: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                sends: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn sends(&self) -> u32 {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Transport for Arc<MockTransport> {
        async fn send(
            &self,
            request: &crate::request::PreparedRequest,
        ) -> Result<RawResponse, TransportError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().expect("lock").push(request.clone());
            self.script
                .lock()
                .expect("lock")
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn response(status: u16, body: &str, headers: &[(&str, &str)]) -> RawResponse {
        RawResponse {
            status,
            headers: headers
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn refused() -> TransportError {
        TransportError::new(TransportCode::ConnectionRefused, "connection refused")
    }

    fn executor(transport: Arc<MockTransport>, max_retry_attempts: u32) -> Executor {
        let builder = RequestBuilder::new(ENDPOINT, Arc::new(BasicSigner::new("user", "pw")));
        let policy = RetryPolicy {
            max_retry_attempts,
            honor_retry_after: false,
            backoff: None,
        };
        Executor::new(Box::new(transport), builder, policy)
    }

    #[tokio::test]
    async fn success_extracts_pagination_headers() {
        let transport = MockTransport::new(vec![Ok(response(
            200,
            r#"[{"id":1},{"id":2}]"#,
            &[
                ("X-WP-Total", "42"),
                ("X-WP-TotalPages", "5"),
                ("Allow", "GET, POST"),
            ],
        ))]);
        let executor = executor(transport.clone(), 5);

        let result = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect("success");

        assert_eq!(result.total_records, Some(42));
        assert_eq!(result.total_pages, Some(5));
        assert_eq!(
            result.allow_methods.as_deref(),
            Some(["GET".to_string(), "POST".to_string()].as_slice())
        );
        assert_eq!(result.as_array().expect("array").len(), 2);
        assert_eq!(transport.sends(), 1);
    }

    #[tokio::test]
    async fn missing_pagination_headers_stay_unset() {
        let transport = MockTransport::new(vec![Ok(response(200, "{}", &[]))]);
        let executor = executor(transport, 5);

        let result = executor
            .execute(&ApiRequest::new(Method::Get, "posts/1"))
            .await
            .expect("success");

        assert_eq!(result.total_records, None);
        assert_eq!(result.total_pages, None);
        assert_eq!(result.allow_methods, None);
    }

    #[tokio::test]
    async fn transient_transport_failure_is_bounded_at_max_plus_one_sends() {
        let max = 3;
        let transport =
            MockTransport::new((0..=max).map(|_| Err(refused())).collect::<Vec<_>>());
        let executor = executor(transport.clone(), max as u32);

        let err = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect_err("exhaustion");

        assert_eq!(transport.sends(), max as u32 + 1);
        assert_eq!(err.kind, ErrorKind::Transient);
        assert!(err.message.contains("retried 3"), "got: {}", err.message);
        assert_eq!(err.method, Some(Method::Get));
        assert_eq!(err.url.as_deref(), Some("https://example.com/wp-json/posts"));
    }

    #[tokio::test]
    async fn fatal_transport_failure_is_not_retried() {
        let transport = MockTransport::new(vec![Err(TransportError::new(
            TransportCode::Other,
            "unsupported proxy",
        ))]);
        let executor = executor(transport.clone(), 5);

        let err = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect_err("fatal");

        assert_eq!(transport.sends(), 1);
        assert_eq!(err.kind, ErrorKind::Fatal);
    }

    #[tokio::test]
    async fn fatal_status_is_not_retried() {
        let transport = MockTransport::new(vec![Ok(response(403, "{}", &[]))]);
        let executor = executor(transport.clone(), 5);

        let err = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect_err("fatal");

        assert_eq!(transport.sends(), 1);
        assert_eq!(err.kind, ErrorKind::Fatal);
        assert_eq!(err.status, Some(403));
        assert_eq!(err.message, "Forbidden: request not allowed.");
    }

    #[tokio::test]
    async fn nonce_collision_is_retried_with_fresh_signature() {
        let body = json!({"code": "json_oauth1_nonce_already_used", "message": "nonce used"});
        let transport = MockTransport::new(vec![
            Ok(response(401, &body.to_string(), &[])),
            Ok(response(200, "{}", &[])),
        ]);
        let builder = RequestBuilder::new(
            ENDPOINT,
            Arc::new(OAuth1Signer::new("ck", "cs", "tok", "ts")),
        );
        let executor = Executor::new(
            Box::new(transport.clone()),
            builder,
            RetryPolicy {
                honor_retry_after: false,
                ..RetryPolicy::default()
            },
        );

        executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect("retry recovers");

        assert_eq!(transport.sends(), 2);
        let seen = transport.seen.lock().expect("lock");
        let auth_of = |attempt: &crate::request::PreparedRequest| {
            attempt
                .headers
                .iter()
                .find(|(key, _)| key == "Authorization")
                .map(|(_, value)| value.clone())
                .expect("auth header")
        };
        // Re-signing per attempt means a different nonce, hence a different header.
        assert_ne!(auth_of(&seen[0]), auth_of(&seen[1]));
    }

    #[tokio::test]
    async fn rate_limit_is_retried_and_recovers() {
        let transport = MockTransport::new(vec![
            Ok(response(429, "{}", &[])),
            Ok(response(200, r#"{"ok":true}"#, &[])),
        ]);
        let executor = executor(transport.clone(), 5);

        let result = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect("recovered");

        assert_eq!(transport.sends(), 2);
        assert_eq!(result.as_object().expect("object")["ok"], true);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_classified_error() {
        let transport = MockTransport::new(vec![
            Ok(response(502, "{}", &[])),
            Ok(response(502, "{}", &[])),
            Ok(response(502, "{}", &[])),
        ]);
        let executor = executor(transport.clone(), 2);

        let err = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect_err("exhaustion");

        assert_eq!(transport.sends(), 3);
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(err.status, Some(502));
        assert_eq!(err.message, "Bad Gateway: server has an issue.");
    }

    #[tokio::test]
    async fn term_exists_conflict_carries_the_server_message() {
        let body = json!({"code": "term_exists", "message": "Term already exists."});
        let transport = MockTransport::new(vec![Ok(response(500, &body.to_string(), &[]))]);
        let executor = executor(transport.clone(), 5);

        let err = executor
            .execute(&ApiRequest::new(Method::Post, "categories"))
            .await
            .expect_err("conflict");

        assert_eq!(transport.sends(), 1);
        assert_eq!(err.kind, ErrorKind::ItemExists);
        assert_eq!(err.message, "Term already exists.");
    }

    #[tokio::test]
    async fn malformed_success_body_is_illegal_response() {
        let transport = MockTransport::new(vec![Ok(response(200, "<html>oops</html>", &[]))]);
        let executor = executor(transport, 5);

        let err = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect_err("illegal");

        assert_eq!(err.kind, ErrorKind::IllegalResponse);
        assert!(
            err.message.contains("<html>oops</html>"),
            "got: {}",
            err.message
        );
    }

    #[tokio::test]
    async fn malformed_error_body_falls_back_to_raw_text() {
        let transport = MockTransport::new(vec![Ok(response(401, "access denied", &[]))]);
        let executor = executor(transport.clone(), 5);

        let err = executor
            .execute(&ApiRequest::new(Method::Get, "posts"))
            .await
            .expect_err("unauthorized");

        assert_eq!(transport.sends(), 1);
        assert_eq!(err.kind, ErrorKind::Fatal);
        assert_eq!(err.message, "Unauthorized: access denied");
    }

    #[tokio::test]
    async fn empty_success_body_is_not_illegal() {
        let transport = MockTransport::new(vec![Ok(response(204, "", &[]))]);
        let executor = executor(transport, 5);

        let result = executor
            .execute(&ApiRequest::new(Method::Delete, "posts/5"))
            .await
            .expect("no-content success");

        assert_eq!(result.status(), 204);
        assert_eq!(result.as_array().expect("array"), Vec::<Value>::new());
        assert_eq!(result.as_object().expect("object"), Value::Null);
    }
}
