//! HTTP client for the storefront REST backend.
//!
//! [`StorefrontClient`] issues JSON requests against a base URL, attaches a
//! bearer token when one is configured, maps HTTP failures onto
//! [`SaddleryError`] and retries transient failures per [`RetryConfig`].
//!
//! The [`ApiSource`] trait is the seam higher layers depend on, so the
//! catalog can run against a mock in tests.

pub mod retry;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::telemetry;
use crate::{Result, SaddleryError};

pub use retry::{RetryConfig, with_retry};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of raw JSON documents addressed by API path.
#[async_trait]
pub trait ApiSource: Send + Sync {
    /// GET `path` (e.g. `/api/products`) and return the decoded body.
    async fn fetch(&self, path: &str) -> Result<serde_json::Value>;
}

/// Authenticated JSON client for the storefront backend.
#[derive(Clone)]
pub struct StorefrontClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    retry: RetryConfig,
}

impl std::fmt::Debug for StorefrontClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .finish()
    }
}

impl StorefrontClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            SaddleryError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        let base_url: String = base_url.into();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            retry: RetryConfig::default(),
        })
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        with_retry(&self.retry, path, || async {
            let response = self.dispatch("GET", self.request(Method::GET, path)).await?;
            decode(response).await
        })
        .await
    }

    /// POST `body` as JSON to `path` and decode the response as `T`.
    ///
    /// POSTs are not idempotent and are never retried.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        let response = self.dispatch("POST", request).await?;
        decode(response).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn dispatch(&self, method: &'static str, request: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "method" => method,
            "status" => if status.is_success() { "ok" } else { "error" },
        )
        .record(start.elapsed().as_secs_f64());
        debug!(url = %response.url(), status = status.as_u16(), "backend response");

        check_status(response).await
    }
}

#[async_trait]
impl ApiSource for StorefrontClient {
    async fn fetch(&self, path: &str) -> Result<serde_json::Value> {
        self.get_json(path).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Map a non-success status onto an error.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(SaddleryError::Unauthorized),
        404 => Err(SaddleryError::NotFound(response.url().path().to_string())),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(SaddleryError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(SaddleryError::Api {
                status: code,
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            })
        }
    }
}

/// Pull `message` (or `error`) out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
