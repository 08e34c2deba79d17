use crate::config::types::{Config, FeedEntry, HookEntry, HttpConfig, NormalizeConfig, QueueConfig};
use crate::toc::DayZone;
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_queue_config(&config.queue)?;
    validate_http_config(&config.http)?;
    validate_normalize_config(&config.normalize)?;

    let mut names = HashSet::new();
    for hook in &config.hooks {
        validate_hook(hook)?;
        ensure_unique_name(&mut names, &hook.name)?;
    }
    for feed in &config.feeds {
        validate_feed(feed)?;
        ensure_unique_name(&mut names, &feed.name)?;
    }
    Ok(())
}

/// Validates queue spacing configuration
fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.default_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "default-interval must be >= 1ms, got {}ms",
            config.default_interval
        )));
    }

    if config.fast_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "fast-interval must be >= 1ms, got {}ms",
            config.fast_interval
        )));
    }

    if config.fast_interval > config.default_interval {
        return Err(ConfigError::Validation(format!(
            "fast-interval ({}ms) must not exceed default-interval ({}ms)",
            config.fast_interval, config.default_interval
        )));
    }

    Ok(())
}

/// Validates outbound HTTP configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got timeout-secs={} connect-timeout-secs={}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    if config.challenge_signatures.is_empty()
        || config
            .challenge_signatures
            .iter()
            .any(|s| s.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "challenge-signatures must contain at least one non-empty entry".to_string(),
        ));
    }

    if !(1..=5).contains(&config.challenge_attempts) {
        return Err(ConfigError::Validation(format!(
            "challenge-attempts must be between 1 and 5, got {}",
            config.challenge_attempts
        )));
    }

    Ok(())
}

/// Validates release date normalization configuration
fn validate_normalize_config(config: &NormalizeConfig) -> Result<(), ConfigError> {
    config
        .time_zone
        .parse::<DayZone>()
        .map(|_| ())
        .map_err(ConfigError::Validation)
}

/// Validates a selector hook entry
fn validate_hook(hook: &HookEntry) -> Result<(), ConfigError> {
    validate_name(&hook.name)?;
    validate_pattern(&hook.pattern)?;

    validate_selector(&hook.episode_selector)?;
    for selector in [&hook.title_selector, &hook.date_selector, &hook.end_selector]
        .into_iter()
        .flatten()
    {
        validate_selector(selector)?;
    }

    if hook.date_format.is_some() && hook.date_selector.is_none() {
        return Err(ConfigError::Validation(format!(
            "Hook '{}' sets date-format without date-selector",
            hook.name
        )));
    }

    Ok(())
}

/// Validates a feed hook entry
fn validate_feed(feed: &FeedEntry) -> Result<(), ConfigError> {
    validate_name(&feed.name)?;
    validate_pattern(&feed.pattern)
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "Hook name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_unique_name(names: &mut HashSet<String>, name: &str) -> Result<(), ConfigError> {
    if !names.insert(name.to_string()) {
        return Err(ConfigError::Validation(format!(
            "Hook name '{}' is used more than once",
            name
        )));
    }
    Ok(())
}

/// Validates a URL pattern (a regular expression)
fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "URL pattern cannot be empty".to_string(),
        ));
    }

    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Validates a CSS selector
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ParserKind;
    use crate::hooks::FetchMode;

    fn create_test_hook() -> HookEntry {
        HookEntry {
            name: "example".to_string(),
            pattern: r"^https?://example\.com/novel/".to_string(),
            fetch: FetchMode::Streamed,
            parser: ParserKind::Document,
            title_selector: Some("h1".to_string()),
            episode_selector: "ul.chapters a[href]".to_string(),
            date_selector: None,
            date_format: None,
            end_selector: None,
            reverse: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern(r"^https://example\.com/").is_ok());
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern("(unclosed").is_err());
    }

    #[test]
    fn test_validate_selector() {
        assert!(validate_selector("ul.chapters > li a[href]").is_ok());
        assert!(validate_selector("ul..chapters").is_err());
    }

    #[test]
    fn test_queue_intervals() {
        let mut config = Config::default();
        config.queue.fast_interval = 2000;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        config.queue.fast_interval = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_challenge_attempts_bounds() {
        let mut config = Config::default();
        config.http.challenge_attempts = 0;
        assert!(validate(&config).is_err());

        config.http.challenge_attempts = 6;
        assert!(validate(&config).is_err());

        config.http.challenge_attempts = 3;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_signature_rejected() {
        let mut config = Config::default();
        config.http.challenge_signatures = vec!["".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_time_zone() {
        let mut config = Config::default();
        config.normalize.time_zone = "mars/olympus".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_hook_names() {
        let mut config = Config::default();
        config.hooks = vec![create_test_hook(), create_test_hook()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_feed_and_hook_share_namespace() {
        let mut config = Config::default();
        config.hooks = vec![create_test_hook()];
        config.feeds = vec![FeedEntry {
            name: "example".to_string(),
            pattern: "^https://example.com/feed".to_string(),
        }];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_date_format_requires_selector() {
        let mut hook = create_test_hook();
        hook.date_format = Some("%Y-%m-%d".to_string());
        assert!(validate_hook(&hook).is_err());

        hook.date_selector = Some("time".to_string());
        assert!(validate_hook(&hook).is_ok());
    }

    #[test]
    fn test_invalid_hook_selector() {
        let mut hook = create_test_hook();
        hook.episode_selector = "a[".to_string();
        assert!(matches!(
            validate_hook(&hook),
            Err(ConfigError::InvalidSelector(_))
        ));
    }
}
