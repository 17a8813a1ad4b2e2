//! Pluggable HTTP transport
//!
//! [`Transport`] is the single seam between the SDK and the outside world.
//! The default [`HttpTransport`] wraps a pooled reqwest client and owns the
//! whole retry policy: exponential backoff, retryable only on timeouts,
//! connection failures and 5xx responses. Everything above it sees one
//! success-or-typed-error boundary per logical request.

use crate::config::ClientConfig;
use crate::error::NetworkError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP method subset the SDK uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single outbound request
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Extra headers beyond the JSON defaults
    pub headers: Vec<(String, String)>,
    /// JSON body for POST requests
    pub body: Option<serde_json::Value>,
    /// Per-request deadline override
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// A GET request for the given URL
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// A POST request with a JSON body
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout: None,
        }
    }

    /// Override the transport deadline for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A decoded 2xx response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code (always 2xx from a transport)
    pub status: u16,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Decode the body as JSON into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, NetworkError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }

    /// The body as lossy UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The transport seam.
///
/// Implementations map transport failures to [`NetworkError::ConnectionFailed`]
/// or [`NetworkError::Timeout`], and non-2xx statuses to
/// [`NetworkError::HttpStatus`]; a returned `HttpResponse` is always 2xx.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one logical request, including any internal retries
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError>;
}

/// Default transport over a pooled reqwest client
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Build a transport from client settings
    pub fn new(config: ClientConfig) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let deadline = request.timeout.unwrap_or(self.config.timeout);
        let response = builder.send().await.map_err(|e| map_send_error(e, deadline))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_send_error(e, deadline))?
            .to_vec();

        if (200..300).contains(&status) {
            Ok(HttpResponse { status, body })
        } else {
            Err(NetworkError::HttpStatus {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        let mut delay = self.config.retry_base_delay;
        let mut attempt = 1u32;

        loop {
            match self.execute_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        url = %request.url,
                        attempt,
                        max = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after {err}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn map_send_error(err: reqwest::Error, deadline: Duration) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout(deadline)
    } else {
        NetworkError::ConnectionFailed(err.to_string())
    }
}
