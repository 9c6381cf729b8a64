//! HTTP transport and the retrying fetcher
//!
//! `Transport` is the single network seam: one GET, body as text. The
//! `HttpFetcher` on top of it retries transport failures with a linear
//! backoff. HTTP status codes are not inspected here; a rendered error page is
//! still a body and the page loader decides whether it is usable.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::retry::BackoffPolicy;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Out of attempts for {url} after {attempts} tries: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl TransportError {
    pub fn request(url: &str, message: impl Into<String>) -> Self {
        Self::Request {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// One GET round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;
}

/// Opens a fresh connection pool. Each stage gets its own.
pub trait TransportFactory: Send + Sync {
    fn open(&self) -> Result<Arc<dyn Transport>, TransportError>;
}

/// reqwest-backed transport with the fixed request headers
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| TransportError::ClientBuild(format!("Invalid user agent: {e}")))?,
        );
        if config.keep_alive {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds));
        if let Some(idle) = config.pool_idle_per_host {
            builder = builder.pool_max_idle_per_host(idle);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::request(url, e.to_string()))?;

        debug!("Response from: {} ({})", url, response.status());

        response
            .text()
            .await
            .map_err(|e| TransportError::request(url, format!("Failed to read response body: {e}")))
    }
}

/// Builds a new `ReqwestTransport` (and so a new pool) per call.
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    config: HttpConfig,
}

impl ReqwestTransportFactory {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn open(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(ReqwestTransport::new(&self.config)?))
    }
}

/// Transport plus transport-level retry policy.
#[derive(Clone)]
pub struct HttpFetcher {
    transport: Arc<dyn Transport>,
    policy: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: BackoffPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Fetch `url`, retrying transport failures until the budget runs out.
    pub async fn fetch(&self, url: &str) -> Result<String, TransportError> {
        debug!("Fetching url: {}", url);

        let mut attempt = 0;
        loop {
            match self.transport.get_text(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(
                        "Attempt {} of {} for {} failed: {}",
                        attempt + 1,
                        self.policy.max_attempts,
                        url,
                        e
                    );
                    if !self.policy.has_next(attempt) {
                        error!("Out of attempts for url: {}", url);
                        return Err(TransportError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt + 1,
                            last: e.to_string(),
                        });
                    }
                    sleep(self.policy.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
