use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::timeout;

use crate::config::{Config, CrawlerConfig};
use crate::page::Response;

/// Source of responses for the worker threads.
///
/// Implementations block the calling thread until the response (or error) is ready.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Response, FetchError>;
}

/// HTTP client for making web requests
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    runtime: Handle,
    timeout_duration: Duration,
    user_agent: String,
    max_content_size: usize,
}

impl HttpClient {
    /// Create a client driven by `runtime`. Worker threads must not be runtime threads.
    pub fn new(user_agent: String, timeout_secs: u64, runtime: Handle) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(30))
            .http1_only()
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            timeout_duration: Duration::from_secs(timeout_secs),
            user_agent,
            max_content_size: Config::MAX_CONTENT_SIZE,
        })
    }

    pub fn from_config(config: &CrawlerConfig, runtime: Handle) -> Result<Self, FetchError> {
        Self::new(
            config.user_agent.clone(),
            config.request_timeout_secs,
            runtime,
        )
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch a URL, retrying transient errors with linear backoff.
    pub async fn fetch_async(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let backoff_ms = Config::RETRY_BACKOFF_MS * attempt as u64;
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }

            match self.fetch_once(url).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < Config::MAX_RETRIES => {
                    tracing::debug!(url, attempt, error = %e, "Retrying fetch");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Response, FetchError> {
        let response = timeout(
            self.timeout_duration,
            self.client
                .get(url)
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header("Accept-Language", "en-US,en;q=0.5")
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(Self::classify_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(length as usize, self.max_content_size));
            }
        }

        let body = timeout(self.timeout_duration, response.bytes())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::BodyError(e.to_string()))?;

        if body.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len(), self.max_content_size));
        }

        Ok(Response {
            status,
            url: final_url,
            content: if body.is_empty() { None } else { Some(body.to_vec()) },
            content_type,
        })
    }

    fn classify_error(error: reqwest::Error) -> FetchError {
        let error_msg = error.to_string().to_lowercase();

        if error_msg.contains("connection refused") {
            return FetchError::ConnectionRefused;
        }
        if error_msg.contains("dns") || error_msg.contains("name resolution") {
            return FetchError::DnsError;
        }
        if error_msg.contains("ssl")
            || error_msg.contains("tls")
            || error_msg.contains("certificate")
        {
            return FetchError::SslError;
        }
        if error.is_timeout() {
            return FetchError::Timeout;
        }

        FetchError::NetworkError(error.to_string())
    }
}

impl Fetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        self.runtime.block_on(self.fetch_async(url))
    }
}

/// Errors that can occur during HTTP fetching
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    DnsError,

    #[error("SSL/TLS error")]
    SslError,

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),
}

impl FetchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::NetworkError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("broken pipe")
                    || msg_lower.contains("connection reset")
                    || msg_lower.contains("temporary")
            }
            FetchError::ClientBuild(_)
            | FetchError::ConnectionRefused
            | FetchError::DnsError
            | FetchError::SslError
            | FetchError::BodyError(_)
            | FetchError::ContentTooLarge(_, _) => false,
        }
    }
}
