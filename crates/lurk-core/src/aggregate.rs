//! Per-participant session accounting.
//!
//! Records live in an arena addressed by [`RecordId`]; names map onto ids.
//! A nick change binds the new name to the old record, so both names read
//! and write the same totals.
//!
//! # Visit counter
//!
//! A record starts with `n_visits = 1` and every closed session adds one, so
//! one completed visit reads as 2. Persisted state from earlier runs relies
//! on this, so it is kept as is.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchor::ResolvedEvent;
use crate::event::{Event, PresenceKind};
use crate::types::{Bucket, Nick};

/// Errors raised while folding events into records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    /// A session would close before it opened. Timestamps are out of order
    /// or the log is corrupt.
    #[error("session for {who} closes at {closed} before it opened at {opened}")]
    NegativeDuration {
        who: String,
        opened: NaiveDateTime,
        closed: NaiveDateTime,
    },

    /// A name points past the end of the record arena.
    #[error("name {name} refers to missing record {id}")]
    UnknownRecord { name: Nick, id: RecordId },
}

/// Index of a record in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(usize);

impl RecordId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cumulative presence statistics for one participant identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Every name this identity has used, with how often it switched to it.
    pub aliases: BTreeMap<Nick, u64>,
    pub n_visits: u64,
    /// Start of the current session; `None` while closed.
    #[serde(default)]
    pub open_since: Option<NaiveDateTime>,
    #[serde(default)]
    pub lines_in_session: u64,
    #[serde(default)]
    pub last_talked_at: Option<NaiveDateTime>,
    /// When the most recent session closed.
    #[serde(default)]
    pub last_in_at: Option<NaiveDateTime>,
    /// Seconds present, keyed by how chatty each visit was.
    #[serde(default)]
    pub visits_by_bucket: BTreeMap<Bucket, f64>,
    #[serde(default)]
    pub total_lines: u64,
    #[serde(default)]
    pub total_time_seconds: f64,
    /// `ln(total_lines / total_time_seconds)`, set by [`Aggregator::finish_up`].
    #[serde(default)]
    pub efficiency: Option<f64>,
}

impl SessionRecord {
    /// Creates a closed record known by a single name.
    #[must_use]
    pub fn new(nick: Nick) -> Self {
        Self {
            aliases: BTreeMap::from([(nick, 1)]),
            n_visits: 1,
            open_since: None,
            lines_in_session: 0,
            last_talked_at: None,
            last_in_at: None,
            visits_by_bucket: BTreeMap::new(),
            total_lines: 0,
            total_time_seconds: 0.0,
            efficiency: None,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open_since.is_some()
    }

    /// The most used alias; ties go to the alphabetically first name.
    #[must_use]
    pub fn primary_alias(&self) -> Option<&Nick> {
        self.aliases
            .iter()
            .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
            .map(|(nick, _)| nick)
    }

    /// Seconds accumulated in one bucket, zero if none.
    #[must_use]
    pub fn bucket_seconds(&self, bucket: Bucket) -> f64 {
        self.visits_by_bucket.get(&bucket).copied().unwrap_or(0.0)
    }

    fn open(&mut self, at: NaiveDateTime, lines: u64) {
        self.open_since = Some(at);
        self.lines_in_session = lines;
    }

    fn check_close(&self, at: NaiveDateTime) -> Result<(), AggregateError> {
        match self.open_since {
            Some(opened) if at < opened => Err(AggregateError::NegativeDuration {
                who: self
                    .primary_alias()
                    .map_or_else(String::new, ToString::to_string),
                opened,
                closed: at,
            }),
            _ => Ok(()),
        }
    }

    /// Leaves the record untouched when the close would be negative.
    fn close(&mut self, at: NaiveDateTime) -> Result<(), AggregateError> {
        self.check_close(at)?;
        self.last_in_at = Some(at);
        let Some(opened) = self.open_since else {
            return Ok(());
        };

        #[allow(clippy::cast_precision_loss)]
        let seconds = (at - opened).num_milliseconds() as f64 / 1000.0;
        let lines = self.lines_in_session;
        *self
            .visits_by_bucket
            .entry(Bucket::for_lines(lines))
            .or_insert(0.0) += seconds;
        self.n_visits += 1;
        self.total_lines += lines;
        self.total_time_seconds += seconds;
        self.open_since = None;
        self.lines_in_session = 0;
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn compute_efficiency(&mut self) {
        self.efficiency = if self.total_time_seconds > 0.0 {
            let ratio = self.total_lines as f64 / self.total_time_seconds;
            (ratio > 0.0).then(|| ratio.ln())
        } else {
            None
        };
    }
}

/// Folds resolved events into session records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregator {
    records: Vec<SessionRecord>,
    names: BTreeMap<Nick, RecordId>,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an aggregator from a record arena and a name table.
    pub fn from_parts(
        records: Vec<SessionRecord>,
        names: BTreeMap<Nick, RecordId>,
    ) -> Result<Self, AggregateError> {
        if let Some((name, id)) = names.iter().find(|(_, id)| id.index() >= records.len()) {
            return Err(AggregateError::UnknownRecord {
                name: name.clone(),
                id: *id,
            });
        }
        Ok(Self { records, names })
    }

    /// The record arena, in creation order.
    #[must_use]
    pub fn arena(&self) -> &[SessionRecord] {
        &self.records
    }

    /// Every known name and the record it points at.
    #[must_use]
    pub const fn name_map(&self) -> &BTreeMap<Nick, RecordId> {
        &self.names
    }

    /// Number of known names (several may share a record).
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn record_id(&self, name: &str) -> Option<RecordId> {
        self.names.get(name).copied()
    }

    #[must_use]
    pub fn record(&self, name: &str) -> Option<&SessionRecord> {
        self.record_id(name).and_then(|id| self.records.get(id.index()))
    }

    /// Whether two names resolve to the same underlying record.
    #[must_use]
    pub fn shares_record(&self, a: &str, b: &str) -> bool {
        matches!((self.record_id(a), self.record_id(b)), (Some(x), Some(y)) if x == y)
    }

    /// Each distinct record reachable from a name, once.
    pub fn records(&self) -> impl Iterator<Item = (RecordId, &SessionRecord)> {
        let mut seen = HashSet::new();
        self.names.values().filter_map(move |&id| {
            if seen.insert(id) {
                self.records.get(id.index()).map(|r| (id, r))
            } else {
                None
            }
        })
    }

    fn fetch_or_create(&mut self, who: &Nick) -> RecordId {
        if let Some(id) = self.record_id(who.as_str()) {
            return id;
        }
        let id = RecordId(self.records.len());
        self.records.push(SessionRecord::new(who.clone()));
        self.names.insert(who.clone(), id);
        id
    }

    fn slot(&mut self, who: &Nick) -> &mut SessionRecord {
        let id = self.fetch_or_create(who);
        &mut self.records[id.index()]
    }

    /// Opens a session. An already open session is restarted and its
    /// unflushed lines and time are lost.
    pub fn on_joined(&mut self, who: &Nick, at: NaiveDateTime) {
        let record = self.slot(who);
        record.open(at, 0);
        record.last_in_at = None;
    }

    /// Counts a line; talking while absent opens a session.
    pub fn on_message(&mut self, who: &Nick, at: NaiveDateTime) {
        let record = self.slot(who);
        if record.is_open() {
            record.lines_in_session += 1;
        } else {
            record.open(at, 1);
        }
        record.last_talked_at = Some(at);
    }

    /// Closes a session (quit, part or kick). Without an open session only
    /// `last_in_at` moves.
    pub fn on_quit(&mut self, who: &Nick, at: NaiveDateTime) -> Result<(), AggregateError> {
        self.slot(who).close(at)
    }

    /// Moves the session from `from` to `to`.
    ///
    /// An unbound `to` becomes another key for `from`'s record. If `to`
    /// already has a record it keeps it: the alias is still counted on
    /// `from`'s record, the old session closes there, and the new one opens
    /// on `to`'s own record. Nothing is merged or orphaned.
    pub fn on_nick_changed(
        &mut self,
        from: &Nick,
        to: &Nick,
        at: NaiveDateTime,
    ) -> Result<(), AggregateError> {
        if let Some(record) = self.record(from.as_str()) {
            record.check_close(at)?;
        }
        let id = self.fetch_or_create(from);
        *self.records[id.index()]
            .aliases
            .entry(to.clone())
            .or_insert(0) += 1;

        match self.record_id(to.as_str()) {
            None => {
                self.names.insert(to.clone(), id);
            }
            Some(existing) if existing != id => {
                tracing::warn!(%from, %to, "nick change onto a name with its own record");
            }
            Some(_) => {}
        }

        self.on_quit(from, at)?;
        self.on_joined(to, at);
        Ok(())
    }

    /// Routes one resolved event to its handler.
    pub fn apply(&mut self, resolved: &ResolvedEvent) -> Result<(), AggregateError> {
        let at = resolved.at;
        match &resolved.event {
            Event::Header(_) | Event::Discarded => Ok(()),
            Event::Presence {
                kind: PresenceKind::Joined,
                who,
            } => {
                self.on_joined(who, at);
                Ok(())
            }
            Event::Presence {
                kind: PresenceKind::Left | PresenceKind::Quit,
                who,
            } => self.on_quit(who, at),
            Event::Kicked { who } => self.on_quit(who, at),
            Event::Message { who } => {
                self.on_message(who, at);
                Ok(())
            }
            Event::NickChanged { from, to } => self.on_nick_changed(from, to, at),
        }
    }

    /// Closes every open session at `now` and computes efficiencies.
    ///
    /// Fails without touching any record if a session opened after `now`.
    pub fn finish_up(&mut self, now: NaiveDateTime) -> Result<(), AggregateError> {
        for record in &self.records {
            record.check_close(now)?;
        }
        let mut closed = 0usize;
        for record in &mut self.records {
            if record.is_open() {
                record.close(now)?;
                closed += 1;
            }
            record.compute_efficiency();
        }
        tracing::debug!(closed, records = self.records.len(), "finished up sessions");
        Ok(())
    }
}
