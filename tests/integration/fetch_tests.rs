use crate::common::{request_count, test_config, test_pipeline, CHAPTER_LIST};
use scraper::{Html, Selector};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use toc_ripple::fetch::{Method, RequestOptions, NOT_LOADED};
use toc_ripple::{FetchError, ParserKind, Partition};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn heading(html: &Html) -> Option<String> {
    let selector = Selector::parse("h1").unwrap();
    html.select(&selector)
        .next()
        .map(|h| h.text().collect::<String>())
}

fn link_count(html: &Html) -> usize {
    let selector = Selector::parse("a[href]").unwrap();
    html.select(&selector).count()
}

#[tokio::test]
async fn test_streamed_document() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CHAPTER_LIST)
                .insert_header("content-type", "text/html")
                .insert_header("server", "nginx"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/1", mock_server.uri());

    let title = pipeline
        .fetch_document_streamed(&url, RequestOptions::default(), ParserKind::Document, heading)
        .await
        .expect("Streamed fetch failed");

    assert_eq!(title.as_deref(), Some("The Long Road"));
}

#[tokio::test]
async fn test_streamed_fragment() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ajax/chapters"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<li><a href="/c1">One</a></li><li><a href="/c2">Two</a></li>"#,
        ))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/ajax/chapters", mock_server.uri());

    let links = pipeline
        .fetch_document_streamed(&url, RequestOptions::default(), ParserKind::Fragment, link_count)
        .await
        .unwrap();

    assert_eq!(links, 2);
}

#[tokio::test]
async fn test_anti_bot_server_falls_back_to_buffered_fetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CHAPTER_LIST)
                .insert_header("server", "cloudflare"),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/1", mock_server.uri());

    let title = pipeline
        .fetch_document_streamed(&url, RequestOptions::default(), ParserKind::Document, heading)
        .await
        .unwrap();

    assert_eq!(title.as_deref(), Some("The Long Road"));
    assert_eq!(request_count(&mock_server).await, 2);
}

#[tokio::test]
async fn test_streamed_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/404", mock_server.uri());

    let err = pipeline
        .fetch_document_streamed(&url, RequestOptions::default(), ParserKind::Document, heading)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_empty_body_is_parse_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/empty", mock_server.uri());

    let err = pipeline
        .fetch_document_buffered(&url, RequestOptions::default(), heading)
        .await
        .unwrap_err();

    match err {
        FetchError::Parse { message, .. } => assert_eq!(message, "No Document parsed"),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_truncated_body_is_not_loaded() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Promises 1000 bytes, sends a few, then hangs up
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 1000\r\n\r\n<html><body><h1>Partial",
            )
            .await
            .unwrap();
        socket.flush().await.unwrap();
    });

    let pipeline = test_pipeline(&test_config());
    let url = format!("http://{}/novel/1", addr);

    let err = pipeline
        .fetch_document_streamed(&url, RequestOptions::default(), ParserKind::Document, heading)
        .await
        .unwrap_err();

    match err {
        FetchError::Parse { message, .. } => assert!(message.starts_with(NOT_LOADED), "{}", message),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_challenge_is_retried_until_cleared() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_string("<html><body>Checking your browser</body></html>")
                .insert_header("server", "cloudflare"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CHAPTER_LIST)
                .insert_header("server", "cloudflare"),
        )
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/1", mock_server.uri());

    let title = pipeline
        .fetch_document_buffered(&url, RequestOptions::default(), heading)
        .await
        .unwrap();

    assert_eq!(title.as_deref(), Some("The Long Road"));
    assert_eq!(request_count(&mock_server).await, 2);
}

#[tokio::test]
async fn test_challenge_that_never_clears() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).insert_header("server", "cloudflare"))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/1", mock_server.uri());

    let err = pipeline
        .fetch_raw(&url, RequestOptions::default(), Method::Get)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Challenge { .. }));
    assert_eq!(request_count(&mock_server).await, 2);
}

#[tokio::test]
async fn test_vendor_error_without_challenge_is_a_status_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).insert_header("server", "cloudflare"))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/1", mock_server.uri());

    let err = pipeline
        .fetch_raw(&url, RequestOptions::default(), Method::Get)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(request_count(&mock_server).await, 1);
}

#[tokio::test]
async fn test_fetch_raw_sends_request_options() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chapters"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"chapters":[]}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/api/chapters", mock_server.uri());
    let options = RequestOptions::default()
        .header("X-Requested-With", "XMLHttpRequest")
        .form(vec![("novel".to_string(), "1".to_string())]);

    let body = pipeline.fetch_raw(&url, options, Method::Post).await.unwrap();
    assert_eq!(body, r#"{"chapters":[]}"#);
}

#[tokio::test]
async fn test_full_response_keeps_error_statuses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(410)
                .set_body_string("gone")
                .insert_header("x-reason", "removed"),
        )
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let url = format!("{}/novel/1", mock_server.uri());

    let response = pipeline
        .fetch_full_response(&url, RequestOptions::default(), Method::Get, Partition::Default)
        .await
        .unwrap();

    assert_eq!(response.status, 410);
    assert_eq!(response.body, "gone");
    assert_eq!(response.header("X-Reason"), Some("removed"));
}

#[tokio::test]
async fn test_probe_link_uses_fast_partition() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/alive"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());

    let alive = pipeline
        .probe_link(&format!("{}/alive", mock_server.uri()))
        .await
        .unwrap();
    let dead = pipeline
        .probe_link(&format!("{}/dead", mock_server.uri()))
        .await
        .unwrap();

    assert!(alive.available);
    assert!(!dead.available);
    assert_eq!(dead.status, 404);

    let registry = pipeline.registry();
    assert_eq!(registry.len(Partition::Fast), 1);
    assert!(registry.is_empty(Partition::Default));
}

#[tokio::test]
async fn test_same_host_shares_one_queue() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let pipeline = test_pipeline(&test_config());
    let first = format!("{}/a", mock_server.uri());
    let second = format!("{}/b", mock_server.uri());

    let (a, b) = tokio::join!(
        pipeline.fetch_raw(&first, RequestOptions::default(), Method::Get),
        pipeline.fetch_raw(&second, RequestOptions::default(), Method::Get),
    );

    assert_eq!(a.unwrap(), "ok");
    assert_eq!(b.unwrap(), "ok");
    assert_eq!(pipeline.registry().len(Partition::Default), 1);
}
