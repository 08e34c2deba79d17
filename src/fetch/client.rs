//! HTTP clients behind a single capability trait
//!
//! The pipeline talks to the network only through [`HttpClient`]. Two
//! implementations exist:
//! - [`StreamingClient`]: a lightweight client whose responses are consumed
//!   chunk by chunk
//! - [`ChallengeClient`]: a cookie-keeping, browser-like client that waits out
//!   anti-bot interstitials before giving up
//!
//! Detection of anti-bot responses lives in [`is_challenge_server`] so every
//! caller applies the same rule.

use crate::config::HttpConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Put,
    Post,
    Patch,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
            Self::Put => reqwest::Method::PUT,
            Self::Post => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra request headers
    pub headers: Vec<(String, String)>,

    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,

    /// URL-encoded form body; takes precedence over `body`
    pub form: Option<Vec<(String, String)>>,

    /// Raw request body
    pub body: Option<String>,

    /// Overrides the client-wide timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully described outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub options: RequestOptions,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            url: url.into(),
            options,
        }
    }

    /// Applies this request onto a reqwest client
    fn build(&self, client: &Client) -> RequestBuilder {
        let mut builder = client.request(self.method.as_reqwest(), &self.url);

        for (name, value) in &self.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !self.options.query.is_empty() {
            builder = builder.query(&self.options.query);
        }
        if let Some(form) = &self.options.form {
            builder = builder.form(form);
        } else if let Some(body) = &self.options.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.options.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }

    async fn send(&self, client: &Client) -> Result<Response, FetchError> {
        self.build(client)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: self.url.clone(),
                source,
            })
    }
}

/// Capability shared by every client the pipeline can use
///
/// Implementations return the response as soon as headers arrive; the body is
/// left for the caller to consume. HTTP error statuses are not failures at this
/// level.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Sends `request` and returns the response once its headers are in
    async fn execute(&self, request: &HttpRequest) -> Result<Response, FetchError>;
}

/// Builds the lightweight client used for streamed fetches
///
/// # Arguments
///
/// * `config` - The `[http]` configuration section
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```
/// use toc_ripple::config::HttpConfig;
/// use toc_ripple::fetch::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the client used to get past anti-bot interstitials
///
/// Unlike [`build_http_client`], this client keeps cookies between requests
/// (clearance cookies are what an interstitial hands out) and sends the
/// headers a browser would.
pub fn build_challenge_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(browser_headers())
        .cookie_store(true)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

/// Checks a `server` header against the anti-bot vendor signatures
///
/// Matching is a case-insensitive prefix comparison, so `cloudflare` matches
/// both `cloudflare` and `Cloudflare-nginx`.
///
/// # Examples
///
/// ```
/// use toc_ripple::fetch::is_challenge_server;
///
/// let signatures = vec!["cloudflare".to_string()];
/// assert!(is_challenge_server(Some("Cloudflare-nginx"), &signatures));
/// assert!(!is_challenge_server(Some("nginx"), &signatures));
/// assert!(!is_challenge_server(None, &signatures));
/// ```
pub fn is_challenge_server(server: Option<&str>, signatures: &[String]) -> bool {
    let Some(server) = server else {
        return false;
    };
    let server = server.trim_start().to_ascii_lowercase();

    signatures
        .iter()
        .map(|signature| signature.trim().to_ascii_lowercase())
        .any(|signature| !signature.is_empty() && server.starts_with(&signature))
}

/// Returns the `server` header of a response, if it is valid text
pub fn server_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SERVER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Plain client whose responses are consumed as a stream
#[derive(Debug, Clone)]
pub struct StreamingClient {
    client: Client,
}

impl StreamingClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, FetchError> {
        build_http_client(config)
            .map(Self::new)
            .map_err(FetchError::Client)
    }
}

#[async_trait]
impl HttpClient for StreamingClient {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn execute(&self, request: &HttpRequest) -> Result<Response, FetchError> {
        request.send(&self.client).await
    }
}

/// Client that waits out anti-bot interstitials
///
/// A response counts as an interstitial when its `server` header carries an
/// anti-bot signature and its status is 403, 429 or 503. The client then waits
/// `retry_delay` and tries again with whatever cookies it has collected, up to
/// `attempts` requests in total. Pages served normally by the vendor (any other
/// status) are returned untouched.
#[derive(Debug, Clone)]
pub struct ChallengeClient {
    client: Client,
    signatures: Vec<String>,
    retry_delay: Duration,
    attempts: u32,
}

impl ChallengeClient {
    pub fn new(client: Client, signatures: Vec<String>, retry_delay: Duration, attempts: u32) -> Self {
        Self {
            client,
            signatures,
            retry_delay,
            attempts: attempts.max(1),
        }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = build_challenge_client(config).map_err(FetchError::Client)?;
        Ok(Self::new(
            client,
            config.challenge_signatures.clone(),
            Duration::from_millis(config.challenge_retry_delay),
            config.challenge_attempts,
        ))
    }

    fn is_interstitial(&self, response: &Response) -> bool {
        matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) && is_challenge_server(server_header(response).as_deref(), &self.signatures)
    }
}

#[async_trait]
impl HttpClient for ChallengeClient {
    fn name(&self) -> &'static str {
        "challenge"
    }

    async fn execute(&self, request: &HttpRequest) -> Result<Response, FetchError> {
        let mut attempt = 1;
        loop {
            let response = request.send(&self.client).await?;
            if !self.is_interstitial(&response) {
                return Ok(response);
            }

            if attempt >= self.attempts {
                tracing::warn!(url = %request.url, attempts = attempt, "Challenge was not cleared");
                return Err(FetchError::Challenge {
                    url: request.url.clone(),
                });
            }

            tracing::info!(
                url = %request.url,
                status = response.status().as_u16(),
                attempt,
                delay = ?self.retry_delay,
                "Challenge page received, waiting before retry"
            );
            drop(response);
            tokio::time::sleep(self.retry_delay).await;
            attempt += 1;
        }
    }
}
