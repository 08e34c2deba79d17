use std::sync::Arc;
use toc_ripple::config::Config;
use toc_ripple::{FetchPipeline, QueueRegistry};
use wiremock::MockServer;

pub const CHAPTER_LIST: &str = r#"<html>
<head><title>Site Title</title></head>
<body>
    <h1 class="title">The Long Road</h1>
    <ol class="chapters">
        <li><a href="/novel/1/c2">Chapter 2</a> <time datetime="2024-03-02T10:00:00Z">yesterday</time></li>
        <li><a href="/novel/1/c1">Chapter 1</a> <time datetime="2024-03-01">two days ago</time></li>
    </ol>
</body>
</html>"#;

/// Creates a configuration with short spacing and retry delays
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.queue.default_interval = 10;
    config.queue.fast_interval = 10;
    config.http.challenge_retry_delay = 10;
    config.http.challenge_attempts = 2;
    config
}

pub fn test_pipeline(config: &Config) -> FetchPipeline {
    let registry = Arc::new(QueueRegistry::from_config(&config.queue));
    FetchPipeline::from_config(config, registry).expect("Failed to build pipeline")
}

/// Regex matching every URL served by `server`
pub fn server_pattern(server: &MockServer, path: &str) -> String {
    format!("^{}{}", regex::escape(&server.uri()), regex::escape(path))
}

pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}
