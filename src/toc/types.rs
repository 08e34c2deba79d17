use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The published table of contents of one medium at one source URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toc {
    /// Medium title as shown by the source
    pub title: String,

    /// The URL this table of contents was scraped from
    pub link: String,

    /// Medium the caller expects this table to belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_id: Option<u64>,

    /// Episodes and parts in reading order
    #[serde(default)]
    pub content: Vec<TocEntry>,

    /// Whether the source marks the medium as completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl Toc {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            medium_id: None,
            content: Vec::new(),
            end: None,
            authors: Vec::new(),
            synonyms: Vec::new(),
        }
    }

    /// Iterates every episode, including those nested in parts
    pub fn episodes(&self) -> impl Iterator<Item = &TocEpisode> {
        self.content.iter().flat_map(|entry| match entry {
            TocEntry::Episode(episode) => std::slice::from_ref(episode).iter(),
            TocEntry::Part(part) => part.episodes.iter(),
        })
    }

    /// Mutable counterpart of [`Toc::episodes`]
    pub fn episodes_mut(&mut self) -> impl Iterator<Item = &mut TocEpisode> {
        self.content.iter_mut().flat_map(|entry| match entry {
            TocEntry::Episode(episode) => std::slice::from_mut(episode).iter_mut(),
            TocEntry::Part(part) => part.episodes.iter_mut(),
        })
    }
}

/// One entry of a table of contents
///
/// The variant is fixed at construction and serialized as a `kind` field, so an
/// entry is never ambiguous between a part and an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TocEntry {
    Part(TocPart),
    Episode(TocEpisode),
}

impl From<TocPart> for TocEntry {
    fn from(part: TocPart) -> Self {
        Self::Part(part)
    }
}

impl From<TocEpisode> for TocEntry {
    fn from(episode: TocEpisode) -> Self {
        Self::Episode(episode)
    }
}

/// A volume, book or arc grouping episodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocPart {
    pub title: String,

    pub total_index: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_index: Option<i64>,

    #[serde(default)]
    pub episodes: Vec<TocEpisode>,
}

/// A single released episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEpisode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,

    /// The source only gave a date; the time of day in `release_date` is made up
    #[serde(default)]
    pub no_time: bool,

    pub total_index: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_index: Option<i64>,

    /// The episode exists but is behind a paywall or not yet public
    #[serde(default)]
    pub locked: bool,
}

impl TocEpisode {
    pub fn new(url: impl Into<String>, total_index: i64) -> Self {
        Self {
            title: None,
            url: url.into(),
            release_date: None,
            no_time: false,
            total_index,
            partial_index: None,
            locked: false,
        }
    }
}
