//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings and proxy
//! - GET requests to fetch page content
//! - Retry logic for transient failures
//! - Error classification

use crate::config::{Config, UserAgentConfig};
use reqwest::{Client, Proxy};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    pub status_code: u16,
    pub body: String,
    /// Attempts made, the successful one included
    pub attempts: u32,
}

/// Classified fetch error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt could succeed
    ///
    /// | Condition | Retried |
    /// |-----------|---------|
    /// | HTTP 5xx, 429 | yes |
    /// | Other HTTP errors | no |
    /// | Timeout, network error | yes |
    /// | Cancelled | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::Timeout | Self::Network(_) => true,
            Self::Cancelled => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// A fetch that failed after all allowed attempts
#[derive(Debug, Clone)]
pub struct FetchFailure {
    /// The error of the final attempt
    pub error: FetchError,
    pub attempts: u32,
    /// One message per failed attempt
    pub error_messages: Vec<String>,
}

impl FetchFailure {
    pub fn is_cancelled(&self) -> bool {
        self.error == FetchError::Cancelled
    }
}

/// Fetches a page, retrying as its policy allows
///
/// Implementations stop retrying once `cancel` fires.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<FetchedPage, FetchFailure>> + Send;
}

/// Builds an HTTP client with proper configuration
///
/// The user agent reads `Name/Version (+ContactURL; ContactEmail)`; when a
/// proxy is given every request is routed through it.
///
/// # Example
///
/// ```no_run
/// use reel_harvest::config::UserAgentConfig;
/// use reel_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "ReelHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, None).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    proxy_url: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = proxy_url {
        builder = builder.proxy(Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            client,
            max_retries,
            retry_delay,
        }
    }

    /// Builds the fetcher described by a configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            &config.user_agent,
            config.proxy.as_ref().map(|p| p.url.as_str()),
        )?;
        Ok(Self::new(
            client,
            config.run.max_request_retries,
            Duration::from_millis(config.run.retry_delay_ms),
        ))
    }

    async fn fetch_once(&self, url: &Url) -> Result<(String, u16, String), FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(classify)?;
        Ok((final_url, status.as_u16(), body))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<FetchedPage, FetchFailure>> + Send {
        async move {
            let mut error_messages = Vec::new();
            let mut attempts = 0;

            loop {
                attempts += 1;

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(FetchError::Cancelled),
                    result = self.fetch_once(url) => result,
                };

                let error = match outcome {
                    Ok((final_url, status_code, body)) => {
                        return Ok(FetchedPage {
                            final_url,
                            status_code,
                            body,
                            attempts,
                        })
                    }
                    Err(error) => error,
                };

                if error != FetchError::Cancelled {
                    error_messages.push(error.to_string());
                }

                if !error.is_retryable() || attempts > self.max_retries {
                    return Err(FetchFailure {
                        error,
                        attempts,
                        error_messages,
                    });
                }

                tracing::debug!(
                    "Retrying {} after {} (attempt {} of {})",
                    url,
                    error,
                    attempts,
                    self.max_retries + 1
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(FetchFailure {
                            error: FetchError::Cancelled,
                            attempts,
                            error_messages,
                        });
                    }
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn fetcher(max_retries: u32) -> HttpFetcher {
        let client = build_http_client(&create_test_config(), None).unwrap();
        HttpFetcher::new(client, max_retries, Duration::from_millis(10))
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config(), None).is_ok());
        assert!(build_http_client(&create_test_config(), Some("http://proxy.local:8080")).is_ok());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Status(503).is_retryable());
        assert!(FetchError::Status(429).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(FetchError::Timeout.is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let page = fetcher(2)
            .fetch(&url, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.status_code, 200);
        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(page.attempts, 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let failure = fetcher(3)
            .fetch(&url, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error, FetchError::Status(404));
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.error_messages, vec!["HTTP 404"]);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();
        let failure = fetcher(2)
            .fetch(&url, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error, FetchError::Status(503));
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error_messages.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let failure = fetcher(3).fetch(&url, &cancel).await.unwrap_err();

        assert!(failure.is_cancelled());
        assert!(failure.error_messages.is_empty());
    }
}
