use crate::fetch::ParserKind;
use crate::hooks::FetchMode;
use serde::Deserialize;

/// Main configuration structure for Toc-Ripple
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default, rename = "hook")]
    pub hooks: Vec<HookEntry>,
    #[serde(default, rename = "feed")]
    pub feeds: Vec<FeedEntry>,
}

/// Per-host queue spacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Ceiling of the randomized gap between requests to one host (milliseconds)
    #[serde(rename = "default-interval", default = "default_interval")]
    pub default_interval: u64,

    /// Ceiling used by the fast partition for cheap requests (milliseconds)
    #[serde(rename = "fast-interval", default = "fast_interval")]
    pub fast_interval: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_interval: default_interval(),
            fast_interval: fast_interval(),
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// `server` header prefixes identifying an anti-bot vendor (case-insensitive)
    #[serde(rename = "challenge-signatures", default = "challenge_signatures")]
    pub challenge_signatures: Vec<String>,

    /// Wait before retrying a challenged request (milliseconds)
    #[serde(rename = "challenge-retry-delay", default = "challenge_retry_delay")]
    pub challenge_retry_delay: u64,

    /// Total attempts the challenge client makes before giving up
    #[serde(rename = "challenge-attempts", default = "challenge_attempts")]
    pub challenge_attempts: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: user_agent(),
            timeout_secs: timeout_secs(),
            connect_timeout_secs: connect_timeout_secs(),
            challenge_signatures: challenge_signatures(),
            challenge_retry_delay: challenge_retry_delay(),
            challenge_attempts: challenge_attempts(),
        }
    }
}

/// Release date normalization configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeConfig {
    /// Zone whose calendar days decide same-day smoothing
    /// (`utc`, `local`, or a fixed offset such as `+02:00`)
    #[serde(rename = "time-zone", default = "time_zone")]
    pub time_zone: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            time_zone: time_zone(),
        }
    }
}

/// Declarative table-of-contents hook driven by CSS selectors
#[derive(Debug, Clone, Deserialize)]
pub struct HookEntry {
    /// Name used in logs
    pub name: String,

    /// Regular expression matched against the requested URL
    pub pattern: String,

    /// Whether to stream the page or buffer it through the challenge client
    #[serde(default)]
    pub fetch: FetchMode,

    /// Tree construction strategy for streamed pages
    #[serde(default)]
    pub parser: ParserKind,

    /// Selector for the medium title
    #[serde(rename = "title-selector")]
    pub title_selector: Option<String>,

    /// Selector for episode links (`a[href]` elements)
    #[serde(rename = "episode-selector")]
    pub episode_selector: String,

    /// Selector for the release date, looked up within the episode link's parent
    #[serde(rename = "date-selector")]
    pub date_selector: Option<String>,

    /// chrono format of the release date text
    #[serde(rename = "date-format")]
    pub date_format: Option<String>,

    /// Selector whose presence marks the medium as completed
    #[serde(rename = "end-selector")]
    pub end_selector: Option<String>,

    /// Set when the site lists the newest episode first
    #[serde(default)]
    pub reverse: bool,
}

/// RSS or Atom feed hook
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    /// Name used in logs
    pub name: String,

    /// Regular expression matched against the requested URL
    pub pattern: String,
}

fn default_interval() -> u64 {
    1000
}

fn fast_interval() -> u64 {
    100
}

fn user_agent() -> String {
    format!("Mozilla/5.0 (compatible; toc-ripple/{})", env!("CARGO_PKG_VERSION"))
}

fn timeout_secs() -> u64 {
    30
}

fn connect_timeout_secs() -> u64 {
    10
}

fn challenge_signatures() -> Vec<String> {
    vec!["cloudflare".to_string()]
}

fn challenge_retry_delay() -> u64 {
    5000
}

fn challenge_attempts() -> u32 {
    2
}

fn time_zone() -> String {
    "utc".to_string()
}
