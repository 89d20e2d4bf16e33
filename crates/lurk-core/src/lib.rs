//! Core domain logic for lurk.
//!
//! This crate contains:
//! - Grammar: classifying irssi log lines into events
//! - Day anchoring: turning `HH:MM` stamps into absolute times
//! - Dispatch: running both over an ordered list of files
//! - Aggregation: per-participant session statistics

pub mod aggregate;
pub mod anchor;
pub mod dispatch;
pub mod event;
pub mod grammar;
mod types;

pub use aggregate::{AggregateError, Aggregator, RecordId, SessionRecord};
pub use anchor::{DayAnchor, MissingAnchor, ResolvedEvent};
pub use dispatch::{DispatchError, Dispatcher, FileSummary};
pub use event::{Event, LogLine, PresenceKind};
pub use grammar::{ClassifyError, classify_line};
pub use types::{Bucket, Nick, ValidationError};
