//! Day anchoring for time-of-day stamps.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::event::{Event, LogLine};

/// An event with its absolute time attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEvent {
    pub at: NaiveDateTime,
    pub event: Event,
}

/// Raised when a timestamped line appears before any header has set a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timestamped line before any log-opened or day-changed header")]
pub struct MissingAnchor;

/// Combines `HH:MM` stamps with the date of the most recent header.
///
/// One resolver lives for a whole run, so a day change in one file carries
/// into the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayAnchor {
    date: Option<NaiveDate>,
}

impl DayAnchor {
    /// Creates an anchor with no date set.
    #[must_use]
    pub const fn new() -> Self {
        Self { date: None }
    }

    /// The current anchor date, if a header has been seen.
    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Combines a time of day with the anchored date.
    pub fn at(&self, time: NaiveTime) -> Result<NaiveDateTime, MissingAnchor> {
        self.date.map(|d| d.and_time(time)).ok_or(MissingAnchor)
    }

    /// Feeds one classified line through the anchor.
    ///
    /// Headers move the anchor and yield nothing. Discarded lines yield
    /// nothing. Everything else comes back with an absolute time.
    pub fn resolve(&mut self, line: LogLine) -> Result<Option<ResolvedEvent>, MissingAnchor> {
        match (line.event, line.time) {
            (Event::Header(date), _) => {
                self.date = Some(date);
                Ok(None)
            }
            (Event::Discarded, _) | (_, None) => Ok(None),
            (event, Some(time)) => Ok(Some(ResolvedEvent {
                at: self.at(time)?,
                event,
            })),
        }
    }
}
