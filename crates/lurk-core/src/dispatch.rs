//! Drives the grammar and the day anchor over a sequence of log files.
//!
//! A file is classified and resolved in full, then its events are applied to
//! a copy of the records. The copy and the moved day anchor replace the live
//! state only once the whole file has gone through, so a file that fails at
//! any stage changes nothing. Files applied earlier in the run stay applied.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::aggregate::{AggregateError, Aggregator};
use crate::anchor::{DayAnchor, ResolvedEvent};
use crate::grammar::{ClassifyError, classify_line};

/// A failure tied to a position in an input file.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("{file}:{line}: {source}")]
    Classify {
        file: String,
        line: usize,
        #[source]
        source: ClassifyError,
    },

    #[error("{file}:{line}: timestamped line before any log-opened or day-changed header")]
    MissingAnchor { file: String, line: usize },

    #[error("{file}:{line}: {source}")]
    Aggregate {
        file: String,
        line: usize,
        #[source]
        source: AggregateError,
    },
}

/// Counts from one processed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    /// Lines read, including headers and cruft.
    pub lines: usize,
    /// Events handed to the aggregator.
    pub events: usize,
}

/// One run over an ordered list of log files.
#[derive(Debug, Default)]
pub struct Dispatcher {
    anchor: DayAnchor,
    aggregator: Aggregator,
}

impl Dispatcher {
    /// Starts a run with no prior state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run on top of previously persisted records.
    #[must_use]
    pub fn with_state(aggregator: Aggregator) -> Self {
        Self {
            anchor: DayAnchor::new(),
            aggregator,
        }
    }

    #[must_use]
    pub const fn anchor(&self) -> &DayAnchor {
        &self.anchor
    }

    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Processes the full text of one log file.
    ///
    /// `file` is only used to label errors.
    pub fn ingest(&mut self, file: &str, contents: &str) -> Result<FileSummary, DispatchError> {
        let mut anchor = self.anchor;
        let mut resolved: Vec<(usize, ResolvedEvent)> = Vec::new();
        let mut lines = 0;

        for (idx, raw) in contents.lines().enumerate() {
            let line = idx + 1;
            lines = line;
            let classified = classify_line(raw).map_err(|source| DispatchError::Classify {
                file: file.to_string(),
                line,
                source,
            })?;
            let event = anchor
                .resolve(classified)
                .map_err(|_| DispatchError::MissingAnchor {
                    file: file.to_string(),
                    line,
                })?;
            if let Some(event) = event {
                resolved.push((line, event));
            }
        }

        let mut aggregator = self.aggregator.clone();
        for (line, event) in &resolved {
            aggregator
                .apply(event)
                .map_err(|source| DispatchError::Aggregate {
                    file: file.to_string(),
                    line: *line,
                    source,
                })?;
        }
        self.anchor = anchor;
        self.aggregator = aggregator;

        let summary = FileSummary {
            lines,
            events: resolved.len(),
        };
        tracing::debug!(file, lines = summary.lines, events = summary.events, "file dispatched");
        Ok(summary)
    }

    /// Closes open sessions at `now` and hands back the records.
    pub fn finish(mut self, now: NaiveDateTime) -> Result<Aggregator, AggregateError> {
        self.aggregator.finish_up(now)?;
        Ok(self.aggregator)
    }
}
