use crate::toc::Toc;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Time zone whose calendar days decide whether two instants are "the same day"
///
/// The zone is explicit configuration so results do not depend on where the
/// process happens to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayZone {
    #[default]
    Utc,
    /// The host's local zone
    Local,
    /// A fixed offset from UTC
    Fixed(FixedOffset),
}

impl DayZone {
    /// Calendar date of `instant` in this zone
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Utc => instant.date_naive(),
            Self::Local => instant.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// Whether both instants fall on the same calendar day in this zone
    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.date_of(a) == self.date_of(b)
    }
}

impl FromStr for DayZone {
    type Err = String;

    /// Parses `utc`, `local`, or an offset such as `+02:00` / `-0530`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(Self::Utc),
            "local" => return Ok(Self::Local),
            _ => {}
        }

        value.parse::<FixedOffset>().map(Self::Fixed).map_err(|e| {
            format!(
                "time-zone must be 'utc', 'local' or an offset like '+02:00', got '{}': {}",
                s, e
            )
        })
    }
}

impl fmt::Display for DayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "utc"),
            Self::Local => write!(f, "local"),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Stamps `medium_id` onto the only table of contents in `tocs`
///
/// A source that yields a single table is assumed to be about the medium the
/// caller asked for. With zero or several tables nothing is stamped.
///
/// # Returns
///
/// `true` if a table was stamped
pub fn stamp_single_medium(tocs: &mut [Toc], medium_id: Option<u64>) -> bool {
    match (tocs, medium_id) {
        ([toc], Some(id)) => {
            toc.medium_id = Some(id);
            true
        }
        _ => false,
    }
}

/// Collapses date-only release times of the last scrape day onto `last_request`
///
/// Sources that only publish dates get a synthetic time of day on every
/// scrape, which makes "newest release" ordering jitter between passes. When
/// `last_request` falls on today's date (in `zone`), every episode flagged
/// `no_time` whose release date is that same day gets `last_request` as its
/// release date. Episodes nested in parts are included.
///
/// # Arguments
///
/// * `tocs` - Freshly scraped tables of contents
/// * `last_request` - When the previous scrape of this source happened
/// * `now` - The current instant
/// * `zone` - Zone defining calendar days
///
/// # Returns
///
/// The number of episodes whose release date was replaced
pub fn smooth_release_dates(
    tocs: &mut [Toc],
    last_request: DateTime<Utc>,
    now: DateTime<Utc>,
    zone: DayZone,
) -> usize {
    if !zone.same_day(last_request, now) {
        return 0;
    }

    let mut smoothed = 0;
    for episode in tocs.iter_mut().flat_map(Toc::episodes_mut) {
        let same_day = episode
            .release_date
            .is_some_and(|date| zone.same_day(date, last_request));

        if episode.no_time && same_day {
            episode.release_date = Some(last_request);
            smoothed += 1;
        }
    }
    smoothed
}
