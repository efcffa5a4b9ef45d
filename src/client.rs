//! Verb-shaped API facade.
//!
//! One method per HTTP verb semantic. Each operation merges its `context`
//! parameter, delegates to the executor, stores the request and result in
//! single-slot fields (overwritten by the next call, not a history), and
//! returns `&mut Self` so result accessors chain off the call.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};

use crate::auth::signer_from_config;
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::executor::{ApiResult, Executor, RetryPolicy};
use crate::request::{ApiRequest, Method, RequestBuilder};
use crate::transport::{HttpTransport, Transport};

/// Response field subset selector (the `context` request parameter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Context {
    #[default]
    View,
    Edit,
}

impl Context {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
        }
    }
}

/// Paging and filtering options for [`Client::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub context: Context,
    /// 1-based page number; omitted from the query when `None`.
    pub page: Option<u32>,
    pub per_page: u32,
    /// Additional query parameters (filters, search, ordering).
    pub params: BTreeMap<String, Value>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            context: Context::View,
            page: None,
            per_page: 10,
            params: BTreeMap::new(),
        }
    }
}

/// Authenticated client for one API endpoint.
///
/// An instance runs one logical operation at a time (`&mut self` on every
/// verb); drive separate instances for concurrent work.
pub struct Client {
    executor: Executor,
    last_request: Option<ApiRequest>,
    last_result: Option<ApiResult>,
}

impl Client {
    /// Build a client with the production HTTP transport.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs));
        Self::with_transport(config, Box::new(transport))
    }

    /// Build with a caller-supplied transport (tests, instrumentation).
    pub fn with_transport(
        config: &ClientConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let signer = signer_from_config(config)?;
        let endpoint = config.api_root()?;
        let builder = RequestBuilder::new(endpoint, signer);
        let policy = RetryPolicy {
            max_retry_attempts: config.max_retry_attempts,
            ..RetryPolicy::default()
        };
        Ok(Self {
            executor: Executor::new(transport, builder, policy),
            last_request: None,
            last_result: None,
        })
    }

    /// Override retry pacing/bounds for subsequent operations.
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.executor.set_policy(policy);
    }

    pub fn endpoint(&self) -> &str {
        self.executor.endpoint()
    }

    /// Fetch a collection or item.
    pub async fn fetch(
        &mut self,
        path: &str,
        options: FetchOptions,
    ) -> Result<&mut Self, ApiError> {
        let mut request = ApiRequest::new(Method::Get, path);
        request.params = options.params;
        request
            .params
            .insert("context".to_string(), json!(options.context.as_str()));
        request
            .params
            .insert("per_page".to_string(), json!(options.per_page));
        if let Some(page) = options.page {
            request.params.insert("page".to_string(), json!(page));
        }
        self.run(request).await
    }

    /// Create a resource (POST).
    pub async fn create(
        &mut self,
        path: &str,
        context: Context,
        data: BTreeMap<String, Value>,
    ) -> Result<&mut Self, ApiError> {
        self.write(Method::Post, path, context, data).await
    }

    /// Fully replace a resource (PUT).
    pub async fn replace(
        &mut self,
        path: &str,
        context: Context,
        data: BTreeMap<String, Value>,
    ) -> Result<&mut Self, ApiError> {
        self.write(Method::Put, path, context, data).await
    }

    /// Partially update a resource (PATCH).
    pub async fn patch(
        &mut self,
        path: &str,
        context: Context,
        data: BTreeMap<String, Value>,
    ) -> Result<&mut Self, ApiError> {
        self.write(Method::Patch, path, context, data).await
    }

    /// Delete a resource; `force` skips the trash and deletes permanently.
    pub async fn remove(&mut self, path: &str, force: bool) -> Result<&mut Self, ApiError> {
        let mut request = ApiRequest::new(Method::Delete, path);
        if force {
            request.params.insert("force".to_string(), json!(true));
        }
        self.run(request).await
    }

    /// Upload a raw file body (POST with attachment headers).
    pub async fn upload(
        &mut self,
        path: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<&mut Self, ApiError> {
        let mut request = ApiRequest::new(Method::Post, path);
        request.raw_body = Some(data);
        request.headers.insert(
            "Content-Disposition".to_string(),
            format!("attachment; filename={file_name}"),
        );
        request
            .headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self.run(request).await
    }

    async fn write(
        &mut self,
        method: Method,
        path: &str,
        context: Context,
        mut data: BTreeMap<String, Value>,
    ) -> Result<&mut Self, ApiError> {
        data.insert("context".to_string(), json!(context.as_str()));
        let mut request = ApiRequest::new(method, path);
        request.params = data;
        self.run(request).await
    }

    async fn run(&mut self, request: ApiRequest) -> Result<&mut Self, ApiError> {
        let outcome = self.executor.execute(&request).await;
        self.last_request = Some(request);
        match outcome {
            Ok(result) => {
                self.last_result = Some(result);
                Ok(self)
            }
            Err(err) => {
                self.last_result = None;
                Err(err)
            }
        }
    }

    // Result accessors for the last operation.

    /// Last response decoded as a JSON array; empty when no result is held.
    pub fn as_array(&self) -> Result<Vec<Value>, ApiError> {
        match &self.last_result {
            Some(result) => result.as_array(),
            None => Ok(Vec::new()),
        }
    }

    /// Last response decoded as a JSON value; `Null` when no result is held.
    pub fn as_object(&self) -> Result<Value, ApiError> {
        match &self.last_result {
            Some(result) => result.as_object(),
            None => Ok(Value::Null),
        }
    }

    /// Last raw response body.
    pub fn as_raw(&self) -> Option<&str> {
        self.last_result.as_ref().map(|result| result.as_raw())
    }

    /// Full result of the last successful operation.
    pub fn last_result(&self) -> Option<&ApiResult> {
        self.last_result.as_ref()
    }

    /// Body content the last operation sent, when it carried one.
    pub fn last_request_body(&self) -> Option<String> {
        let request = self.last_request.as_ref()?;
        let prepared = self.executor.prepare(request).ok()?;
        let body = prepared.body?;
        Some(String::from_utf8_lossy(&body).into_owned())
    }

    /// `X-WP-Total` from the last successful operation.
    pub fn total_records(&self) -> Option<u64> {
        self.last_result.as_ref().and_then(|r| r.total_records)
    }

    /// `X-WP-TotalPages` from the last successful operation.
    pub fn total_pages(&self) -> Option<u64> {
        self.last_result.as_ref().and_then(|r| r.total_pages)
    }

    /// `Allow` methods from the last successful operation.
    pub fn allow_methods(&self) -> Option<&[String]> {
        self.last_result
            .as_ref()
            .and_then(|r| r.allow_methods.as_deref())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PreparedRequest;
    use crate::transport::{RawResponse, TransportError};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted transport for facade-level tests.
    struct ScriptedTransport {
        script: Mutex<VecDeque<RawResponse>>,
        seen: Mutex<Vec<PreparedRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl crate::transport::Transport for Arc<ScriptedTransport> {
        async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
            self.seen.lock().expect("lock").push(request.clone());
            Ok(self
                .script
                .lock()
                .expect("lock")
                .pop_front()
                .expect("script exhausted"))
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

    fn dev_config() -> ClientConfig {
        ClientConfig {
            endpoint: "https://example.com/wp-json".to_string(),
            username: "dev".to_string(),
            password: "dev-pass".to_string(),
            ..ClientConfig::default()
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> Client {
        Client::with_transport(&dev_config(), Box::new(transport)).expect("client")
    }

    #[tokio::test]
    async fn fetch_merges_paging_parameters_into_the_query() {
        let transport = ScriptedTransport::new(vec![response(
            200,
            "[]",
            &[("X-WP-Total", "25"), ("X-WP-TotalPages", "3")],
        )]);
        let mut client = client(transport.clone());

        let options = FetchOptions {
            page: Some(2),
            ..FetchOptions::default()
        };
        client.fetch("posts", options).await.expect("fetch");

        let seen = transport.seen.lock().expect("lock");
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(
            seen[0].url,
            "https://example.com/wp-json/posts?context=view&page=2&per_page=10"
        );
        assert_eq!(client.total_records(), Some(25));
        assert_eq!(client.total_pages(), Some(3));
    }

    #[tokio::test]
    async fn remove_carries_the_force_marker() {
        let transport = ScriptedTransport::new(vec![response(200, "{}", &[])]);
        let mut client = client(transport.clone());

        client.remove("posts/5", true).await.expect("remove");

        let seen = transport.seen.lock().expect("lock");
        assert_eq!(seen[0].method, Method::Delete);
        assert_eq!(
            seen[0].url,
            "https://example.com/wp-json/posts/5?force=true"
        );
    }

    #[tokio::test]
    async fn remove_without_force_has_no_marker() {
        let transport = ScriptedTransport::new(vec![response(200, "{}", &[])]);
        let mut client = client(transport.clone());

        client.remove("posts/5", false).await.expect("remove");

        let seen = transport.seen.lock().expect("lock");
        assert_eq!(seen[0].url, "https://example.com/wp-json/posts/5");
    }

    #[tokio::test]
    async fn create_merges_context_into_the_json_body() {
        let transport = ScriptedTransport::new(vec![response(201, r#"{"id":7}"#, &[])]);
        let mut client = client(transport.clone());

        let mut data = BTreeMap::new();
        data.insert("title".to_string(), json!("Hello"));
        client
            .create("posts", Context::Edit, data)
            .await
            .expect("create");

        let seen = transport.seen.lock().expect("lock");
        let body: Value =
            serde_json::from_slice(seen[0].body.as_deref().expect("body")).expect("json");
        assert_eq!(body["context"], "edit");
        assert_eq!(body["title"], "Hello");
        assert_eq!(
            client.last_request_body().expect("request body"),
            serde_json::to_string(&body).expect("encode")
        );
    }

    #[tokio::test]
    async fn accessors_chain_off_the_operation() {
        let transport = ScriptedTransport::new(vec![response(200, r#"[{"id":1}]"#, &[])]);
        let mut client = client(transport);

        let posts = client
            .fetch("posts", FetchOptions::default())
            .await
            .expect("fetch")
            .as_array()
            .expect("array");
        assert_eq!(posts.len(), 1);
        assert_eq!(client.as_raw(), Some(r#"[{"id":1}]"#));
    }

    #[tokio::test]
    async fn upload_sends_attachment_headers_and_raw_body() {
        let transport = ScriptedTransport::new(vec![response(201, "{}", &[])]);
        let mut client = client(transport.clone());

        client
            .upload("media", "photo.png", "image/png", b"png-bytes".to_vec())
            .await
            .expect("upload");

        let seen = transport.seen.lock().expect("lock");
        assert_eq!(seen[0].body.as_deref(), Some(b"png-bytes".as_slice()));
        let header = |name: &str| {
            seen[0]
                .headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(
            header("content-disposition"),
            Some("attachment; filename=photo.png")
        );
        assert_eq!(header("content-type"), Some("image/png"));
    }

    #[tokio::test]
    async fn failed_operation_clears_the_result_slot() {
        let transport = ScriptedTransport::new(vec![
            response(200, r#"[{"id":1}]"#, &[]),
            response(404, "{}", &[]),
        ]);
        let mut client = client(transport);

        client.fetch("posts", FetchOptions::default()).await.expect("fetch");
        assert!(client.as_raw().is_some());

        let err = client
            .fetch("posts/999", FetchOptions::default())
            .await
            .expect_err("not found");
        assert_eq!(err.kind, crate::error::ErrorKind::ItemNotFound);
        assert!(client.as_raw().is_none());
        assert_eq!(client.as_array().expect("array"), Vec::<Value>::new());
    }

    #[tokio::test]
    async fn full_url_paths_are_normalized_against_the_endpoint() {
        let transport = ScriptedTransport::new(vec![response(200, "{}", &[])]);
        let mut client = client(transport.clone());

        client
            .fetch(
                "https://example.com/wp-json/posts/5",
                FetchOptions::default(),
            )
            .await
            .expect("fetch");

        let seen = transport.seen.lock().expect("lock");
        assert!(
            seen[0]
                .url
                .starts_with("https://example.com/wp-json/posts/5?"),
            "{}",
            seen[0].url
        );
    }
}
