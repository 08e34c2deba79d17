//! Scraper dispatch
//!
//! Maps a URL to the first registered site hook whose pattern matches, runs it
//! through the fetch pipeline, and normalizes the tables of contents it returns.

mod dispatcher;
mod registry;

pub use dispatcher::{Dispatcher, ResolveHints, ResolvedToc, ScrapeState};
pub use registry::{HookRegistry, TocHook};
