//! Configuration-driven table-of-contents hooks
//!
//! This module contains:
//! - `SelectorHook`, which scrapes an HTML table of contents with CSS selectors
//! - `FeedHook`, which reads an RSS or Atom feed as a table of contents

mod feed;
mod selector;

pub use feed::{parse_feed, FeedHook};
pub use selector::SelectorHook;

use serde::Deserialize;

/// How a selector hook retrieves its page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Stream through the plain client, falling back on anti-bot servers
    #[default]
    Streamed,
    /// Buffer through the challenge client
    Buffered,
}
