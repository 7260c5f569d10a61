//! HTTP fetcher implementation
//!
//! This module performs single page requests for the crawler:
//! - Building the HTTP client with the configured identity headers
//! - One GET per call, never retried here
//! - Classifying every failure as transient or permanent

use crate::config::Config;
use crate::storage::Codepage;
use crate::{ConfigError, HarvestError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Why a fetch did not produce a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// The URL could not be parsed or is not http(s)
    MalformedUrl(String),
    /// The server answered with a non-2xx status
    Status(u16),
    /// The request or body read timed out
    Timeout,
    /// The connection could not be established
    Connect(String),
    /// The transfer broke off mid-way
    Transport(String),
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedUrl(reason) => write!(f, "malformed URL ({})", reason),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Timeout => f.write_str("timed out"),
            Self::Connect(reason) => write!(f, "connection failed ({})", reason),
            Self::Transport(reason) => write!(f, "transfer failed ({})", reason),
        }
    }
}

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A 2xx response and its decoded body
    Success(String),

    /// Network trouble that may go away on its own
    TransientFailure(FetchCause),

    /// A failure retrying cannot fix
    PermanentFailure(FetchCause),
}

/// Performs exactly one request per call
///
/// Implementations never retry: retry and back-off policy belong to the
/// admission controller.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = FetchOutcome> + Send;
}

/// Builds an HTTP client with the configured identity and timeouts
///
/// The user agent and extra headers are fixed for the lifetime of the
/// client, so every request of a run carries the same header set.
pub fn build_http_client(config: &Config) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header {}", name))
        })?;
        headers.insert(name, value);
    }

    let client = Client::builder()
        .user_agent(config.user_agent.value.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.crawler.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Production fetcher over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    fallback_charset: &'static str,
}

impl HttpFetcher {
    /// Creates a fetcher from configuration
    ///
    /// Bodies without a charset in their Content-Type are decoded with
    /// `site.page-encoding`.
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        let client = build_http_client(config)?;
        let codepage = Codepage::from_label(&config.site.page_encoding)?;
        Ok(Self::with_client(client, codepage))
    }

    pub fn with_client(client: Client, codepage: Codepage) -> Self {
        Self {
            client,
            fallback_charset: codepage.name(),
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let url = match parse_fetchable(url) {
            Ok(url) => url,
            Err(cause) => return FetchOutcome::PermanentFailure(cause),
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();
        if !status.is_success() {
            let cause = FetchCause::Status(status.as_u16());
            return if is_transient_status(status) {
                FetchOutcome::TransientFailure(cause)
            } else {
                FetchOutcome::PermanentFailure(cause)
            };
        }

        match response.text_with_charset(self.fallback_charset).await {
            Ok(body) => FetchOutcome::Success(body),
            Err(e) => classify_error(&e),
        }
    }
}

/// Parses a URL and checks it can be requested at all
fn parse_fetchable(raw: &str) -> Result<Url, FetchCause> {
    let url = Url::parse(raw).map_err(|e| FetchCause::MalformedUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(FetchCause::MalformedUrl("missing host".to_string())),
        other => Err(FetchCause::MalformedUrl(format!("unsupported scheme {}", other))),
    }
}

/// 429 and 5xx ask the client to come back later
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_builder() {
        FetchOutcome::PermanentFailure(FetchCause::MalformedUrl(e.to_string()))
    } else if e.is_redirect() {
        FetchOutcome::PermanentFailure(FetchCause::Transport(e.to_string()))
    } else if e.is_timeout() {
        FetchOutcome::TransientFailure(FetchCause::Timeout)
    } else if e.is_connect() {
        FetchOutcome::TransientFailure(FetchCause::Connect(e.to_string()))
    } else {
        FetchOutcome::TransientFailure(FetchCause::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> HttpFetcher {
        let mut config = Config::default();
        config.crawler.request_timeout_secs = 2;
        config
            .headers
            .insert("Accept-Language".to_string(), "ru-RU".to_string());
        HttpFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&Config::default()).is_ok());
    }

    #[test]
    fn test_bad_header_rejected() {
        let mut config = Config::default();
        config
            .headers
            .insert("Bad Header".to_string(), "x".to_string());
        assert!(build_http_client(&config).is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_malformed_url_is_permanent() {
        let fetcher = test_fetcher();
        // None of these reach the network
        for raw in ["not a url", "ftp://kolesa.kz/a", "http://", "https://:443/x"] {
            let outcome = fetcher.fetch(raw).await;
            assert!(
                matches!(outcome, FetchOutcome::PermanentFailure(FetchCause::MalformedUrl(_))),
                "{raw}: {outcome:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_success_sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/show/1"))
            .and(header("accept-language", "ru-RU"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = test_fetcher()
            .fetch(&format!("{}/a/show/1", server.uri()))
            .await;
        assert_eq!(outcome, FetchOutcome::Success("<html>ok</html>".to_string()));
    }

    #[tokio::test]
    async fn test_server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/slow-down"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let busy = fetcher.fetch(&format!("{}/busy", server.uri())).await;
        let slow = fetcher.fetch(&format!("{}/slow-down", server.uri())).await;
        assert_eq!(busy, FetchOutcome::TransientFailure(FetchCause::Status(503)));
        assert_eq!(slow, FetchOutcome::TransientFailure(FetchCause::Status(429)));
    }

    #[tokio::test]
    async fn test_not_found_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = test_fetcher().fetch(&format!("{}/gone", server.uri())).await;
        assert_eq!(outcome, FetchOutcome::PermanentFailure(FetchCause::Status(404)));
    }

    #[tokio::test]
    async fn test_body_without_charset_uses_page_encoding() {
        let server = MockServer::start().await;
        let cp1251 = Codepage::from_label("windows-1251").unwrap();
        let body = cp1251.encode("<h1>Тойота</h1>").unwrap().into_owned();
        Mock::given(path("/legacy"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(body),
            )
            .mount(&server)
            .await;

        let outcome = test_fetcher().fetch(&format!("{}/legacy", server.uri())).await;
        assert_eq!(outcome, FetchOutcome::Success("<h1>Тойота</h1>".to_string()));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = test_fetcher().fetch(&format!("http://{}/x", addr)).await;
        assert!(
            matches!(outcome, FetchOutcome::TransientFailure(_)),
            "{outcome:?}"
        );
    }
}
