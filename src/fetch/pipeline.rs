//! Fetch pipeline: every network operation, routed through a host queue
//!
//! # Operations
//!
//! | Operation | Client | Output | Partition |
//! |-----------|--------|--------|-----------|
//! | `fetch_document_buffered` | challenge | extracted from parsed HTML | default |
//! | `fetch_document_streamed` | streaming, challenge on anti-bot server | extracted from parsed HTML | default |
//! | `fetch_raw` | challenge | body text | default |
//! | `fetch_full_response` | challenge | status, headers, body | caller's choice |
//! | `probe_link` | challenge (HEAD) | availability | fast |
//!
//! A streamed fetch that lands on an anti-bot server drops the raw response
//! unread and re-issues the request through the challenge client inside the
//! same queue slot, so the host still only sees one request at a time.

use crate::config::Config;
use crate::fetch::client::{
    is_challenge_server, server_header, ChallengeClient, HttpClient, HttpRequest, Method,
    RequestOptions, StreamingClient,
};
use crate::fetch::parser::{parse_buffered, ParserKind, StreamingParse, NOT_LOADED};
use crate::queue::{Partition, QueueRegistry};
use crate::FetchError;
use reqwest::Response;
use scraper::Html;
use serde::Serialize;
use std::sync::Arc;

/// Everything a server sent back, without interpretation
#[derive(Debug, Clone, Serialize)]
pub struct FullResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers with textual values
    pub headers: Vec<(String, String)>,
    /// Body text (empty for HEAD requests)
    pub body: String,
}

impl FullResponse {
    /// Looks up a header case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Result of a link availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub url: String,
    pub status: u16,
    /// True for 2xx and 3xx answers
    pub available: bool,
}

/// Turns URLs into parsed documents or raw bodies, one request per host at a time
#[derive(Clone)]
pub struct FetchPipeline {
    registry: Arc<QueueRegistry>,
    streaming: Arc<dyn HttpClient>,
    challenge: Arc<dyn HttpClient>,
    signatures: Arc<Vec<String>>,
}

impl FetchPipeline {
    /// Creates a pipeline from explicit parts
    ///
    /// # Arguments
    ///
    /// * `registry` - The shared host queue registry
    /// * `streaming` - Client for streamed document fetches
    /// * `challenge` - Client for buffered fetches and anti-bot fallback
    /// * `signatures` - `server` header prefixes that trigger the fallback
    pub fn new(
        registry: Arc<QueueRegistry>,
        streaming: Arc<dyn HttpClient>,
        challenge: Arc<dyn HttpClient>,
        signatures: Vec<String>,
    ) -> Self {
        Self {
            registry,
            streaming,
            challenge,
            signatures: Arc::new(signatures),
        }
    }

    /// Creates a pipeline with reqwest-backed clients built from `config`
    pub fn from_config(config: &Config, registry: Arc<QueueRegistry>) -> Result<Self, FetchError> {
        let streaming = StreamingClient::from_config(&config.http)?;
        let challenge = ChallengeClient::from_config(&config.http)?;
        Ok(Self::new(
            registry,
            Arc::new(streaming),
            Arc::new(challenge),
            config.http.challenge_signatures.clone(),
        ))
    }

    /// The registry whose queues this pipeline submits to
    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Fetches a page through the challenge client, buffers it, and parses it
    ///
    /// This is the most robust path and the fallback target of
    /// [`FetchPipeline::fetch_document_streamed`].
    ///
    /// # Returns
    ///
    /// * `Ok(R)` - Output of `extract` run on the parsed document
    /// * `Err(FetchError)` - Transport failure, non-2xx status, unsolved
    ///   challenge, or empty body
    pub async fn fetch_document_buffered<F, R>(
        &self,
        url: &str,
        options: RequestOptions,
        extract: F,
    ) -> Result<R, FetchError>
    where
        F: FnOnce(&Html) -> R + Send + 'static,
        R: Send + 'static,
    {
        let queue = self.registry.resolve(url, Partition::Default)?;
        let request = HttpRequest::new(Method::Get, url, options);
        let challenge = Arc::clone(&self.challenge);

        queue
            .submit(buffered_document(challenge, request, ParserKind::Document, extract))
            .await?
    }

    /// Streams a page into the chosen tree builder
    ///
    /// The response headers are inspected before any body byte is read. If the
    /// `server` header matches an anti-bot signature, the response is dropped
    /// and the request is repeated through the challenge client; a challenge
    /// page is never parsed.
    pub async fn fetch_document_streamed<F, R>(
        &self,
        url: &str,
        options: RequestOptions,
        parser: ParserKind,
        extract: F,
    ) -> Result<R, FetchError>
    where
        F: FnOnce(&Html) -> R + Send + 'static,
        R: Send + 'static,
    {
        let queue = self.registry.resolve(url, Partition::Default)?;
        let request = HttpRequest::new(Method::Get, url, options);
        let streaming = Arc::clone(&self.streaming);
        let challenge = Arc::clone(&self.challenge);
        let signatures = Arc::clone(&self.signatures);

        queue
            .submit(async move {
                let response = streaming.execute(&request).await?;
                let server = server_header(&response);

                if is_challenge_server(server.as_deref(), &signatures) {
                    tracing::info!(
                        url = %request.url,
                        server = server.as_deref().unwrap_or_default(),
                        "Anti-bot server detected, refetching through challenge client"
                    );
                    drop(response);
                    return buffered_document(challenge, request, parser, extract).await;
                }

                let response = ensure_success(&request.url, response)?;
                streamed_document(&request.url, response, parser, extract).await
            })
            .await?
    }

    /// Sends a request and returns the body text without HTML parsing
    ///
    /// Used for feeds and other non-document payloads.
    pub async fn fetch_raw(
        &self,
        url: &str,
        options: RequestOptions,
        method: Method,
    ) -> Result<String, FetchError> {
        let queue = self.registry.resolve(url, Partition::Default)?;
        let request = HttpRequest::new(method, url, options);
        let challenge = Arc::clone(&self.challenge);

        queue
            .submit(async move {
                let response = challenge.execute(&request).await?;
                let response = ensure_success(&request.url, response)?;
                response.text().await.map_err(|source| FetchError::Http {
                    url: request.url.clone(),
                    source,
                })
            })
            .await?
    }

    /// Sends a request and returns status, headers and body
    ///
    /// Error statuses are returned, not raised; the caller inspects
    /// [`FullResponse::status`].
    pub async fn fetch_full_response(
        &self,
        url: &str,
        options: RequestOptions,
        method: Method,
        partition: Partition,
    ) -> Result<FullResponse, FetchError> {
        let queue = self.registry.resolve(url, partition)?;
        let request = HttpRequest::new(method, url, options);
        let challenge = Arc::clone(&self.challenge);

        queue
            .submit(async move {
                let response = challenge.execute(&request).await?;
                into_full_response(&request.url, response).await
            })
            .await?
    }

    /// Checks whether a link still resolves, using a HEAD on the fast partition
    pub async fn probe_link(&self, url: &str) -> Result<LinkStatus, FetchError> {
        let response = self
            .fetch_full_response(url, RequestOptions::default(), Method::Head, Partition::Fast)
            .await?;
        let available = (200..400).contains(&response.status);

        tracing::debug!(url, status = response.status, available, "Probed link");
        Ok(LinkStatus {
            url: url.to_string(),
            status: response.status,
            available,
        })
    }
}

/// Fetches through `client`, buffers the body and parses it
async fn buffered_document<F, R>(
    client: Arc<dyn HttpClient>,
    request: HttpRequest,
    parser: ParserKind,
    extract: F,
) -> Result<R, FetchError>
where
    F: FnOnce(&Html) -> R + Send + 'static,
    R: Send + 'static,
{
    let response = client.execute(&request).await?;
    let response = ensure_success(&request.url, response)?;
    let body = response.bytes().await.map_err(|source| FetchError::Http {
        url: request.url.clone(),
        source,
    })?;

    tracing::debug!(url = %request.url, client = client.name(), bytes = body.len(), "Parsing buffered document");
    parse_buffered(&request.url, parser, &body, extract)
}

/// Feeds the response body into a streaming tree builder chunk by chunk
async fn streamed_document<F, R>(
    url: &str,
    mut response: Response,
    parser: ParserKind,
    extract: F,
) -> Result<R, FetchError>
where
    F: FnOnce(&Html) -> R + Send + 'static,
    R: Send + 'static,
{
    let parse = StreamingParse::start(parser, extract);

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if !parse.feed(chunk.to_vec()).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(url, error = %e, "Body stream failed");
                parse.abort().await;
                return Err(FetchError::Parse {
                    url: url.to_string(),
                    message: format!("{}: {}", NOT_LOADED, e),
                });
            }
        }
    }

    parse.finish(url).await
}

/// Converts a non-2xx response into [`FetchError::Status`]
fn ensure_success(url: &str, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

async fn into_full_response(url: &str, response: Response) -> Result<FullResponse, FetchError> {
    let final_url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response.text().await.map_err(|source| FetchError::Http {
        url: url.to_string(),
        source,
    })?;

    Ok(FullResponse {
        url: final_url,
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_response_header_lookup() {
        let response = FullResponse {
            url: "https://example.com/".to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: String::new(),
        };
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.header("server"), None);
    }

    #[test]
    fn test_from_default_config() {
        let registry = Arc::new(QueueRegistry::default());
        let pipeline = FetchPipeline::from_config(&Config::default(), Arc::clone(&registry)).unwrap();
        assert!(Arc::ptr_eq(pipeline.registry(), &registry));
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_queue() {
        let registry = Arc::new(QueueRegistry::default());
        let pipeline = FetchPipeline::from_config(&Config::default(), Arc::clone(&registry)).unwrap();

        let result = pipeline
            .fetch_raw("not a url", RequestOptions::default(), Method::Get)
            .await;
        assert!(matches!(result, Err(FetchError::InvalidHost(_))));
        assert!(registry.is_empty(Partition::Default));
    }
}
