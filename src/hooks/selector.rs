use crate::config::HookEntry;
use crate::dispatch::TocHook;
use crate::fetch::{FetchPipeline, ParserKind, RequestOptions};
use crate::hooks::FetchMode;
use crate::toc::{Toc, TocEpisode};
use crate::{ConfigError, FetchError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Compiled selectors of one hook
struct Selectors {
    title: Selector,
    episode: Selector,
    date: Option<Selector>,
    end: Option<Selector>,
}

/// What was read off a page, before any URL or date interpretation
#[derive(Debug, Default)]
struct RawPage {
    title: Option<String>,
    episodes: Vec<RawEpisode>,
    ended: Option<bool>,
}

#[derive(Debug)]
struct RawEpisode {
    href: String,
    title: Option<String>,
    date: Option<String>,
}

/// Scrapes a single HTML table of contents with CSS selectors
pub struct SelectorHook {
    name: String,
    fetch: FetchMode,
    parser: ParserKind,
    selectors: Arc<Selectors>,
    date_format: Option<String>,
    reverse: bool,
}

impl SelectorHook {
    /// Compiles a `[[hook]]` configuration entry
    pub fn from_entry(entry: &HookEntry) -> Result<Self, ConfigError> {
        let selectors = Selectors {
            title: compile(entry.title_selector.as_deref().unwrap_or("title"))?,
            episode: compile(&entry.episode_selector)?,
            date: entry.date_selector.as_deref().map(compile).transpose()?,
            end: entry.end_selector.as_deref().map(compile).transpose()?,
        };

        Ok(Self {
            name: entry.name.clone(),
            fetch: entry.fetch,
            parser: entry.parser,
            selectors: Arc::new(selectors),
            date_format: entry.date_format.clone(),
            reverse: entry.reverse,
        })
    }

    /// Turns raw page content into a table of contents
    ///
    /// Episode links are resolved against `page`; links that do not lead to
    /// another document are dropped, as are repeats.
    fn build_toc(&self, page: &Url, raw: RawPage) -> Result<Option<Toc>, FetchError> {
        if raw.episodes.is_empty() {
            return Ok(None);
        }

        let found = raw.episodes.len();
        let mut seen = HashSet::new();
        let mut episodes: Vec<TocEpisode> = raw
            .episodes
            .into_iter()
            .filter_map(|raw| {
                let url = resolve_link(page, &raw.href)?;
                if !seen.insert(url.clone()) {
                    return None;
                }
                let mut episode = TocEpisode::new(url, 0);
                episode.title = raw.title;
                if let Some((date, no_time)) = raw
                    .date
                    .as_deref()
                    .and_then(|text| parse_release_date(text, self.date_format.as_deref()))
                {
                    episode.release_date = Some(date);
                    episode.no_time = no_time;
                }
                Some(episode)
            })
            .collect();

        if episodes.is_empty() {
            return Err(FetchError::Scrape {
                url: page.to_string(),
                message: format!("none of {} episode links could be resolved", found),
            });
        }

        if self.reverse {
            episodes.reverse();
        }
        for (index, episode) in episodes.iter_mut().enumerate() {
            episode.total_index = index as i64 + 1;
        }

        let title = raw.title.unwrap_or_else(|| page.to_string());
        let mut toc = Toc::new(title, page.as_str());
        toc.end = raw.ended;
        toc.content = episodes.into_iter().map(Into::into).collect();
        Ok(Some(toc))
    }
}

#[async_trait]
impl TocHook for SelectorHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, pipeline: &FetchPipeline, url: &Url) -> Result<Vec<Toc>, FetchError> {
        let selectors = Arc::clone(&self.selectors);
        let extract = move |html: &Html| selectors.extract(html);

        let raw = match self.fetch {
            FetchMode::Streamed => {
                pipeline
                    .fetch_document_streamed(url.as_str(), RequestOptions::default(), self.parser, extract)
                    .await?
            }
            FetchMode::Buffered => {
                pipeline
                    .fetch_document_buffered(url.as_str(), RequestOptions::default(), extract)
                    .await?
            }
        };

        tracing::debug!(
            hook = %self.name,
            url = %url,
            episodes = raw.episodes.len(),
            "Extracted page"
        );
        Ok(self.build_toc(url, raw)?.into_iter().collect())
    }
}

impl Selectors {
    fn extract(&self, html: &Html) -> RawPage {
        let title = html
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|title| !title.is_empty());

        let episodes = html
            .select(&self.episode)
            .filter_map(|link| {
                let href = link.value().attr("href")?.trim().to_string();
                let title = Some(element_text(link)).filter(|t| !t.is_empty());
                let date = self.date.as_ref().and_then(|selector| date_text(link, selector));
                Some(RawEpisode { href, title, date })
            })
            .collect();

        let ended = self
            .end
            .as_ref()
            .map(|selector| html.select(selector).next().is_some());

        RawPage {
            title,
            episodes,
            ended,
        }
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Whitespace-collapsed text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Release date text found next to an episode link
///
/// The date element is searched within the link's parent; a `datetime`
/// attribute wins over the element text.
fn date_text(link: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let parent = link.parent().and_then(ElementRef::wrap)?;
    let element = parent.select(selector).next()?;
    let text = match element.value().attr("datetime") {
        Some(value) => value.trim().to_string(),
        None => element_text(element),
    };
    Some(text).filter(|t| !t.is_empty())
}

/// Resolves an episode href against the page it was found on
///
/// Returns None for script, mail, and same-page fragment links.
fn resolve_link(page: &Url, href: &str) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
    {
        return None;
    }

    let url = page.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// Parses a release date, reporting whether it lacked a time of day
///
/// With an explicit `format`, a full timestamp is tried first and a bare date
/// second. Without one, RFC 3339 and `YYYY-MM-DD` are accepted.
fn parse_release_date(text: &str, format: Option<&str>) -> Option<(DateTime<Utc>, bool)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(format) = format {
        if let Ok(date) = DateTime::parse_from_str(text, format) {
            return Some((date.with_timezone(&Utc), false));
        }
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Some((date.and_utc(), false));
        }
        return NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|date| (date.and_utc(), true));
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some((date.with_timezone(&Utc), false));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| (date.and_utc(), true))
}
