use crate::config::Config;
use crate::dispatch::HookRegistry;
use crate::fetch::FetchPipeline;
use crate::toc::{smooth_release_dates, stamp_single_medium, DayZone, Toc};
use crate::url::validate_url;
use crate::{ConfigError, MissingResourceError, ResolveError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Stages a single resolution passes through
///
/// ```text
/// MATCHING -> FETCHING -> NORMALIZING -> SUCCESS
///     |           |             |
///     v           v             v
///   EMPTY       FAILED        EMPTY
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Matching,
    Fetching,
    Normalizing,
    Success,
    Empty,
    Failed,
}

impl fmt::Display for ScrapeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Matching => "matching",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Caller-supplied context for a resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveHints {
    /// Medium the caller expects the source to describe
    pub target_medium_id: Option<u64>,

    /// When this source was last scraped
    pub last_request: Option<DateTime<Utc>>,
}

/// Normalized outcome of a resolution
///
/// "No hook matched" and "hook found nothing" both resolve to an empty
/// `entries` list; they are steady-state outcomes, not faults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedToc {
    pub entries: Vec<Toc>,
}

impl ResolvedToc {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves URLs to normalized tables of contents
pub struct Dispatcher {
    pipeline: FetchPipeline,
    hooks: HookRegistry,
    zone: DayZone,
}

impl Dispatcher {
    pub fn new(pipeline: FetchPipeline, hooks: HookRegistry, zone: DayZone) -> Self {
        Self {
            pipeline,
            hooks,
            zone,
        }
    }

    /// Creates a dispatcher whose hooks and day zone come from `config`
    pub fn from_config(config: &Config, pipeline: FetchPipeline) -> Result<Self, ConfigError> {
        let hooks = HookRegistry::from_config(config)?;
        let zone = config
            .normalize
            .time_zone
            .parse::<DayZone>()
            .map_err(ConfigError::Validation)?;
        Ok(Self::new(pipeline, hooks, zone))
    }

    pub fn pipeline(&self) -> &FetchPipeline {
        &self.pipeline
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Resolves the tables of contents published at `url`
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedToc)` - Possibly empty if no hook matched or nothing was found
    /// * `Err(ResolveError::Url)` - `url` is not a usable absolute URL; no
    ///   request was made
    /// * `Err(ResolveError::MissingResource)` - The source answered 404
    /// * `Err(ResolveError::Fetch)` - Any other failure, unchanged
    pub async fn resolve_toc(
        &self,
        url: &str,
        hints: &ResolveHints,
    ) -> Result<ResolvedToc, ResolveError> {
        self.resolve_toc_at(url, hints, Utc::now()).await
    }

    /// [`Dispatcher::resolve_toc`] with an explicit notion of "now"
    pub async fn resolve_toc_at(
        &self,
        url: &str,
        hints: &ResolveHints,
        now: DateTime<Utc>,
    ) -> Result<ResolvedToc, ResolveError> {
        let parsed = validate_url(url)?;

        tracing::trace!(url, state = %ScrapeState::Matching);
        let Some(hook) = self.hooks.find(parsed.as_str()) else {
            tracing::warn!(url, state = %ScrapeState::Empty, "No scraper matched");
            return Ok(ResolvedToc::default());
        };

        tracing::debug!(url, hook = hook.name(), state = %ScrapeState::Fetching, "Scraping");
        let mut tocs = match hook.scrape(&self.pipeline, &parsed).await {
            Ok(tocs) => tocs,
            Err(e) if e.is_not_found() => {
                tracing::warn!(url, hook = hook.name(), state = %ScrapeState::Failed, "Resource is gone");
                return Err(MissingResourceError::new(
                    format!("Resource no longer exists ({})", e),
                    url,
                )
                .into());
            }
            Err(e) => {
                tracing::error!(url, hook = hook.name(), state = %ScrapeState::Failed, error = %e, "Scrape failed");
                return Err(e.into());
            }
        };

        tracing::trace!(url, state = %ScrapeState::Normalizing);
        if tocs.is_empty() {
            tracing::warn!(url, hook = hook.name(), state = %ScrapeState::Empty, "Scraper found no table of contents");
            return Ok(ResolvedToc::default());
        }

        if stamp_single_medium(&mut tocs, hints.target_medium_id) {
            tracing::debug!(url, medium_id = hints.target_medium_id, "Stamped medium id");
        }
        if let Some(last_request) = hints.last_request {
            let smoothed = smooth_release_dates(&mut tocs, last_request, now, self.zone);
            if smoothed > 0 {
                tracing::debug!(url, smoothed, "Smoothed same-day release dates");
            }
        }

        tracing::info!(
            url,
            hook = hook.name(),
            tocs = tocs.len(),
            state = %ScrapeState::Success,
            "Resolved table of contents"
        );
        Ok(ResolvedToc { entries: tocs })
    }
}
