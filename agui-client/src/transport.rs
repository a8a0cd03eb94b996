//! HTTP transport and auth glue.
//!
//! Builds requests with the protocol headers, injects the configured auth
//! header, and retries transient failures with exponential backoff.
//! Streaming endpoints hand back an [`EventStream`]; JSON endpoints return
//! parsed bodies.

use std::sync::Arc;

use agui_core::RunInput;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::stream::EventStream;

/// HTTP transport over a configured producer.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("server", &self.config.server)
            .field("auth_header", &self.config.auth_header)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Transport {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            ClientError::Configuration(format!("failed to create HTTP client: {}", e))
        })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.server.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Protocol headers plus the configured auth header.
    ///
    /// With `Authorization` and a scheme, the value is `"<scheme> <key>"`;
    /// any other header carries the raw key.
    fn headers(&self) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        if let Some(key) = &self.config.api_key {
            let value = match (&self.config.auth_header[..], &self.config.auth_scheme) {
                ("Authorization", Some(scheme)) => format!("{} {}", scheme, key),
                _ => key.clone(),
            };
            let name = reqwest::header::HeaderName::try_from(self.config.auth_header.as_str())
                .map_err(|e| {
                    ClientError::Configuration(format!("invalid auth header name: {}", e))
                })?;
            headers.insert(
                name,
                HeaderValue::from_str(&value).map_err(|e| {
                    ClientError::Configuration(format!("invalid API key value: {}", e))
                })?,
            );
        }
        Ok(headers)
    }

    /// POST a run input and open the SSE response stream.
    ///
    /// The initial connection is retried under the configured policy; a
    /// stream that drops mid-run is not resumed.
    pub async fn open_run(&self, path: &str, input: &RunInput) -> Result<EventStream, ClientError> {
        let url = self.url(path);
        let headers = self.headers()?;
        self.open_stream(|| {
            self.client
                .post(&url)
                .headers(headers.clone())
                .json(input)
        })
        .await
    }

    /// Open the shared-state subscription stream.
    pub async fn open_shared(
        &self,
        cid: Option<&str>,
        demo: bool,
    ) -> Result<EventStream, ClientError> {
        let url = self.url("shared_state");
        let headers = self.headers()?;
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(cid) = cid {
            query.push(("cid", cid.to_string()));
        }
        if demo {
            query.push(("demo", "true".to_string()));
        }
        self.open_stream(|| {
            self.client
                .get(&url)
                .headers(headers.clone())
                .query(&query)
        })
        .await
    }

    async fn open_stream(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<EventStream, ClientError> {
        let retry = &self.config.retry;
        let mut attempt: u32 = 0;
        loop {
            let err = match build().send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        let content_type = response
                            .headers()
                            .get(CONTENT_TYPE)
                            .and_then(|value| value.to_str().ok())
                            .unwrap_or_default();
                        if !content_type.starts_with("text/event-stream") {
                            return Err(ClientError::Transport(format!(
                                "expected an event stream, got '{}'",
                                content_type
                            )));
                        }
                        return Ok(EventStream::new(response));
                    }
                    let body = response.text().await.unwrap_or_default();
                    ClientError::from_status(status, body)
                }
                Err(e) => ClientError::from_reqwest_error(e),
            };

            if err.is_retryable() && attempt < retry.max_retries {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(%err, attempt, ?delay, "stream connect failed; retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(err);
        }
    }

    /// POST a JSON body and parse the JSON response, with retry.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let url = self.url(path);
        self.execute_json(|| self.client.post(&url).json(body)).await
    }

    /// GET a JSON response, with retry.
    pub async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let url = self.url(path);
        self.execute_json(|| self.client.get(&url)).await
    }

    async fn execute_json(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<Value, ClientError> {
        let headers = self.headers()?;
        let retry = &self.config.retry;
        let mut attempt: u32 = 0;
        loop {
            let result = build().headers(headers.clone()).send().await;
            let err = match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| ClientError::Transport(format!("bad JSON body: {}", e)));
                    }
                    let body = response.text().await.unwrap_or_default();
                    ClientError::from_status(status, body)
                }
                Err(e) => ClientError::from_reqwest_error(e),
            };

            if err.is_retryable() && attempt < retry.max_retries {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(%err, attempt, ?delay, "request failed; retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &str) -> Arc<ClientConfig> {
        Arc::new(ClientConfig {
            server: server.to_string(),
            api_key: Some("key-123".to_string()),
            retry: RetryConfig {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 10,
                jitter: 0.0,
            },
            ..ClientConfig::default()
        })
    }

    #[tokio::test]
    async fn test_bearer_auth_header_injected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .and(header("Authorization", "Bearer key-123"))
            .and(header("Accept", "text/event-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tools": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(config_for(&server.uri())).unwrap();
        let body = transport.get_json("/tools").await.unwrap();
        assert!(body["tools"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_auth_header_uses_raw_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .and(header("X-API-Key", "key-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tools": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = ClientConfig {
            server: server.uri(),
            api_key: Some("key-123".to_string()),
            ..ClientConfig::default()
        };
        config.auth_header = "X-API-Key".to_string();
        let transport = Transport::new(Arc::new(config)).unwrap();
        transport.get_json("/tools").await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_on_503_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shared_state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/shared_state"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let transport = Transport::new(config_for(&server.uri())).unwrap();
        let body = transport
            .post_json("/shared_state", &serde_json::json!({"op": "increment_counter"}))
            .await
            .unwrap();
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_no_retry_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shared_state"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad op"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(config_for(&server.uri())).unwrap();
        let result = transport
            .post_json("/shared_state", &serde_json::json!({"op": "nope"}))
            .await;
        assert!(matches!(result, Err(ClientError::Http { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_401_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = Transport::new(config_for(&server.uri())).unwrap();
        let result = transport.get_json("/tools").await;
        assert!(matches!(result, Err(ClientError::Authentication(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let transport = Transport::new(config_for("http://localhost:1")).unwrap();
        let debug = format!("{:?}", transport);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("key-123"));
    }

    #[test]
    fn test_url_joining() {
        let transport = Transport::new(config_for("http://host:8000/")).unwrap();
        assert_eq!(transport.url("/agentic_chat"), "http://host:8000/agentic_chat");
        assert_eq!(transport.url("tools"), "http://host:8000/tools");
    }
}
