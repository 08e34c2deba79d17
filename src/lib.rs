//! Toc-Ripple: a polite table-of-contents fetcher for serialized web fiction
//!
//! This crate implements the request-shaping layer every scraper funnels through:
//! per-host throttled queues, an HTML fetch pipeline that steps around anti-bot
//! challenges, and a dispatcher that maps URLs to site hooks and normalizes the
//! tables of contents they return.

pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod hooks;
pub mod queue;
pub mod toc;
pub mod url;

use thiserror::Error;

/// Errors raised while fetching a resource through the pipeline
///
/// Everything in here is considered transient by callers: the job store may
/// retry with its own backoff policy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Anti-bot challenge was not cleared for {url}")]
    Challenge { url: String },

    #[error("HTML parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Feed parse error for {url}: {message}")]
    Feed { url: String, message: String },

    #[error("Scrape error for {url}: {message}")]
    Scrape { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("No host could be extracted from {0}")]
    InvalidHost(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl FetchError {
    /// HTTP status carried by this failure, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the upstream server confirmed the resource is gone
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors raised by a host queue itself, never by the tasks it runs
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Task queued for {host} was abandoned before producing a result")]
    Abandoned { host: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// The input was not a usable absolute URL
///
/// Never retry a request that failed this way without correcting the URL first.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}: {url}")]
pub struct UrlError {
    pub message: String,
    pub url: String,
}

impl UrlError {
    pub fn new(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: url.into(),
        }
    }
}

/// The upstream server confirmed (HTTP 404) that a resource no longer exists
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}: {resource}")]
pub struct MissingResourceError {
    pub message: String,
    pub resource: String,
}

impl MissingResourceError {
    pub fn new(message: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: resource.into(),
        }
    }
}

/// Classified failure of a table-of-contents resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    MissingResource(#[from] MissingResourceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ResolveError {
    /// Whether the job store may schedule this request again unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// The URL or resource the failure refers to, when known
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(e) => Some(&e.url),
            Self::MissingResource(e) => Some(&e.resource),
            Self::Fetch(_) => None,
        }
    }
}

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Dispatcher, HookRegistry, ResolveHints, ResolvedToc, TocHook};
pub use fetch::{FetchPipeline, ParserKind};
pub use queue::{HostQueue, Partition, QueueRegistry};
pub use toc::{Toc, TocEntry, TocEpisode, TocPart};
