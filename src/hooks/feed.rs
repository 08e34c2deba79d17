use crate::config::FeedEntry;
use crate::dispatch::TocHook;
use crate::fetch::{FetchPipeline, Method, RequestOptions};
use crate::toc::{Toc, TocEpisode};
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// Reads an RSS 2.0 or Atom feed as a table of contents
pub struct FeedHook {
    name: String,
}

impl FeedHook {
    /// Creates a hook from a `[[feed]]` configuration entry
    pub fn from_entry(entry: &FeedEntry) -> Self {
        Self {
            name: entry.name.clone(),
        }
    }
}

#[async_trait]
impl TocHook for FeedHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, pipeline: &FetchPipeline, url: &Url) -> Result<Vec<Toc>, FetchError> {
        let options = RequestOptions::default().header("Accept", FEED_ACCEPT);
        let body = pipeline.fetch_raw(url.as_str(), options, Method::Get).await?;
        Ok(parse_feed(&body, url)?.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Date,
    Id,
}

#[derive(Debug, Default)]
struct Item {
    title: String,
    link: Option<String>,
    date: String,
    id: String,
}

#[derive(Debug, Default)]
struct FeedReader {
    root_seen: bool,
    title: Option<String>,
    items: Vec<Item>,
    current: Option<Item>,
    field: Option<Field>,
    text: String,
}

impl FeedReader {
    fn start(&mut self, element: &BytesStart<'_>) {
        let name = element.local_name();
        match name.as_ref() {
            b"rss" | b"feed" | b"RDF" => self.root_seen = true,
            b"item" | b"entry" => self.current = Some(Item::default()),
            b"title" => self.begin(Field::Title),
            b"link" => {
                if let Some(href) = attribute(element, b"href") {
                    self.atom_link(element, href);
                } else {
                    self.begin(Field::Link);
                }
            }
            b"pubDate" | b"published" | b"updated" | b"date" => {
                let has_date = self.current.as_ref().is_some_and(|item| !item.date.is_empty());
                if self.current.is_some() && !has_date {
                    self.begin(Field::Date);
                }
            }
            b"guid" | b"id" => self.begin(Field::Id),
            _ => {}
        }
    }

    fn begin(&mut self, field: Field) {
        self.field = Some(field);
        self.text.clear();
    }

    /// Atom links carry the target in `href`; only the alternate one is the episode
    fn atom_link(&mut self, element: &BytesStart<'_>, href: String) {
        let rel = attribute(element, b"rel");
        if !matches!(rel.as_deref(), None | Some("alternate")) {
            return;
        }
        if let Some(item) = self.current.as_mut() {
            item.link.get_or_insert(href);
        }
    }

    fn end(&mut self, name: &[u8]) {
        if matches!(name, b"item" | b"entry") {
            if let Some(item) = self.current.take() {
                self.items.push(item);
            }
            return;
        }

        let Some(field) = self.field.take() else {
            return;
        };
        let text = self.text.trim().to_string();
        match (self.current.as_mut(), field) {
            (Some(item), Field::Title) => item.title = text,
            (Some(item), Field::Link) if !text.is_empty() => {
                item.link.get_or_insert(text);
            }
            (Some(item), Field::Date) => item.date = text,
            (Some(item), Field::Id) => item.id = text,
            (None, Field::Title) if self.title.is_none() && !text.is_empty() => {
                self.title = Some(text)
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.field.is_some() {
            self.text.push_str(text);
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).trim().to_string())
}

/// Parses an RSS 2.0, RSS 1.0 or Atom document into a table of contents
///
/// Feeds list the newest entry first; episodes come out oldest first with
/// `total_index` counting from 1. Items without a usable link are skipped.
///
/// # Returns
///
/// * `Ok(Some(toc))` - The feed had at least one usable item
/// * `Ok(None)` - The feed is well-formed but empty
/// * `Err(FetchError::Feed)` - Malformed XML or not a feed at all
pub fn parse_feed(xml: &str, page: &Url) -> Result<Option<Toc>, FetchError> {
    let feed_error = |message: String| FetchError::Feed {
        url: page.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    let mut feed = FeedReader::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => feed.start(&element),
            Ok(Event::Empty(element)) => {
                feed.start(&element);
                feed.end(element.local_name().as_ref());
            }
            Ok(Event::End(element)) => feed.end(element.local_name().as_ref()),
            Ok(Event::Text(text)) => feed.push_text(&String::from_utf8_lossy(&text.into_inner())),
            Ok(Event::CData(data)) => feed.push_text(&String::from_utf8_lossy(&data.into_inner())),
            Ok(Event::GeneralRef(reference)) => {
                if let Ok(Some(c)) = reference.resolve_char_ref() {
                    feed.push_text(c.encode_utf8(&mut [0; 4]));
                } else {
                    let name = String::from_utf8_lossy(&reference.into_inner()).into_owned();
                    match resolve_predefined_entity(&name) {
                        Some(text) => feed.push_text(text),
                        None => feed.push_text(&format!("&{};", name)),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(feed_error(format!(
                    "malformed XML at byte {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    if !feed.root_seen {
        return Err(feed_error("document is neither RSS nor Atom".to_string()));
    }

    let mut episodes: Vec<TocEpisode> = feed
        .items
        .into_iter()
        .rev()
        .filter_map(|item| {
            let target = item
                .link
                .or_else(|| Some(item.id).filter(|id| id.starts_with("http")))?;
            let url = page.join(&target).ok()?;

            let mut episode = TocEpisode::new(url.to_string(), 0);
            episode.title = Some(item.title).filter(|t| !t.is_empty());
            episode.release_date = parse_feed_date(&item.date);
            Some(episode)
        })
        .collect();

    if episodes.is_empty() {
        return Ok(None);
    }
    for (index, episode) in episodes.iter_mut().enumerate() {
        episode.total_index = index as i64 + 1;
    }

    let title = feed.title.unwrap_or_else(|| page.to_string());
    let mut toc = Toc::new(title, page.as_str());
    toc.content = episodes.into_iter().map(Into::into).collect();
    Ok(Some(toc))
}

/// RSS uses RFC 2822 dates, Atom uses RFC 3339
fn parse_feed_date(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
