use crate::config::Config;
use crate::fetch::FetchPipeline;
use crate::hooks::{FeedHook, SelectorHook};
use crate::toc::Toc;
use crate::{ConfigError, FetchError};
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A site-specific table-of-contents scraper
///
/// Hooks do all their network access through the pipeline they are handed, so
/// every request they make is throttled by the right host queue.
#[async_trait]
pub trait TocHook: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Scrapes the tables of contents published at `url`
    ///
    /// An empty vector means the page exists but lists nothing.
    async fn scrape(&self, pipeline: &FetchPipeline, url: &Url) -> Result<Vec<Toc>, FetchError>;
}

/// Ordered `(pattern, hook)` table
///
/// Registration order is priority order: [`HookRegistry::find`] returns the
/// first hook whose pattern matches.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<(Regex, Arc<dyn TocHook>)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the hook table declared in the configuration
    ///
    /// Selector hooks come first, in file order, followed by feed hooks.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for entry in &config.hooks {
            registry.register(&entry.pattern, Arc::new(SelectorHook::from_entry(entry)?))?;
        }
        for entry in &config.feeds {
            registry.register(&entry.pattern, Arc::new(FeedHook::from_entry(entry)))?;
        }
        Ok(registry)
    }

    /// Appends a hook behind every previously registered one
    pub fn register(&mut self, pattern: &str, hook: Arc<dyn TocHook>) -> Result<(), ConfigError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        self.register_regex(regex, hook);
        Ok(())
    }

    /// Appends a hook with an already compiled pattern
    pub fn register_regex(&mut self, pattern: Regex, hook: Arc<dyn TocHook>) {
        tracing::debug!(hook = hook.name(), pattern = pattern.as_str(), "Registered hook");
        self.hooks.push((pattern, hook));
    }

    /// Returns the first hook whose pattern matches `url`
    pub fn find(&self, url: &str) -> Option<&Arc<dyn TocHook>> {
        self.hooks
            .iter()
            .find(|(pattern, _)| pattern.is_match(url))
            .map(|(_, hook)| hook)
    }

    /// `(hook name, pattern)` pairs in priority order
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.hooks
            .iter()
            .map(|(pattern, hook)| (hook.name(), pattern.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}
