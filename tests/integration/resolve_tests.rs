use crate::common::{server_pattern, test_config, test_pipeline, CHAPTER_LIST};
use chrono::{DateTime, Utc};
use std::io::Write;
use tempfile::NamedTempFile;
use toc_ripple::config::{load_config, Config, FeedEntry};
use toc_ripple::{Dispatcher, ResolveError, ResolveHints};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Feed Novel</title>
    <item>
      <title>Chapter 2</title>
      <link>/novel/9/c2</link>
      <pubDate>Sat, 02 Mar 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Chapter 1</title>
      <link>/novel/9/c1</link>
      <pubDate>Fri, 01 Mar 2024 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Writes a config with one selector hook for `server` and loads it back
fn selector_config(server: &MockServer) -> Config {
    let toml = format!(
        r#"
[queue]
default-interval = 10
fast-interval = 10

[http]
challenge-retry-delay = 10

[normalize]
time-zone = "utc"

[[hook]]
name = "long-road"
pattern = '{}'
title-selector = "h1.title"
episode-selector = "ol.chapters a[href]"
date-selector = "time"
reverse = true
"#,
        server_pattern(server, "/novel/")
    );

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    load_config(file.path()).expect("Failed to load test config")
}

fn dispatcher(config: &Config) -> Dispatcher {
    Dispatcher::from_config(config, test_pipeline(config)).unwrap()
}

#[tokio::test]
async fn test_resolve_selector_hook() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_LIST))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = selector_config(&mock_server);
    let dispatcher = dispatcher(&config);
    let url = format!("{}/novel/1", mock_server.uri());
    let hints = ResolveHints {
        target_medium_id: Some(7),
        last_request: None,
    };

    let resolved = dispatcher.resolve_toc(&url, &hints).await.unwrap();

    assert_eq!(resolved.entries.len(), 1);
    let toc = &resolved.entries[0];
    assert_eq!(toc.title, "The Long Road");
    assert_eq!(toc.medium_id, Some(7));

    let episodes: Vec<_> = toc.episodes().collect();
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].url, format!("{}/novel/1/c1", mock_server.uri()));
    assert_eq!(episodes[0].total_index, 1);
    assert!(episodes[0].no_time);
    assert_eq!(episodes[1].release_date, Some(at("2024-03-02T10:00:00Z")));
    assert!(!episodes[1].no_time);
}

#[tokio::test]
async fn test_resolve_smooths_same_day_dates() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_LIST))
        .mount(&mock_server)
        .await;

    let config = selector_config(&mock_server);
    let dispatcher = dispatcher(&config);
    let url = format!("{}/novel/1", mock_server.uri());
    let last_request = at("2024-03-01T18:30:00Z");
    let hints = ResolveHints {
        target_medium_id: None,
        last_request: Some(last_request),
    };

    let resolved = dispatcher
        .resolve_toc_at(&url, &hints, at("2024-03-01T20:00:00Z"))
        .await
        .unwrap();

    let first = resolved.entries[0].episodes().next().unwrap();
    assert_eq!(first.release_date, Some(last_request));
}

#[tokio::test]
async fn test_resolve_feed_hook() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/9/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(FEED)
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.feeds.push(FeedEntry {
        name: "feed".to_string(),
        pattern: format!("{}/feed$", server_pattern(&mock_server, "/novel/9")),
    });
    let dispatcher = dispatcher(&config);
    let url = format!("{}/novel/9/feed", mock_server.uri());

    let resolved = dispatcher.resolve_toc(&url, &ResolveHints::default()).await.unwrap();

    let toc = &resolved.entries[0];
    assert_eq!(toc.title, "Feed Novel");
    let titles: Vec<_> = toc.episodes().filter_map(|e| e.title.as_deref()).collect();
    assert_eq!(titles, vec!["Chapter 1", "Chapter 2"]);
}

#[tokio::test]
async fn test_not_found_is_missing_resource() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = selector_config(&mock_server);
    let dispatcher = dispatcher(&config);
    let url = format!("{}/novel/gone", mock_server.uri());

    let err = dispatcher
        .resolve_toc(&url, &ResolveHints::default())
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.url(), Some(url.as_str()));
    assert!(matches!(err, ResolveError::MissingResource(_)));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let config = selector_config(&mock_server);
    let dispatcher = dispatcher(&config);
    let url = format!("{}/novel/1", mock_server.uri());

    let err = dispatcher
        .resolve_toc(&url, &ResolveHints::default())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, ResolveError::Fetch(_)));
}

#[tokio::test]
async fn test_unmatched_url_makes_no_request() {
    let mock_server = MockServer::start().await;

    let config = selector_config(&mock_server);
    let dispatcher = dispatcher(&config);
    let url = format!("{}/about", mock_server.uri());

    let resolved = dispatcher
        .resolve_toc(&url, &ResolveHints::default())
        .await
        .unwrap();

    assert!(resolved.is_empty());
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_page_without_episodes_is_empty() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body><h1>Coming soon</h1></body></html>"),
        )
        .mount(&mock_server)
        .await;

    let config = selector_config(&mock_server);
    let dispatcher = dispatcher(&config);
    let url = format!("{}/novel/2", mock_server.uri());

    let resolved = dispatcher
        .resolve_toc(&url, &ResolveHints::default())
        .await
        .unwrap();

    assert!(resolved.is_empty());
}
