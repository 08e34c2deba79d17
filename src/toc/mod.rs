//! Table-of-contents model and normalization
//!
//! - `Toc`, `TocEntry`, `TocPart`, `TocEpisode`: what site hooks produce
//! - `DayZone` and the normalization helpers applied by the dispatcher

mod normalize;
mod types;

pub use normalize::{smooth_release_dates, stamp_single_medium, DayZone};
pub use types::{Toc, TocEntry, TocEpisode, TocPart};
