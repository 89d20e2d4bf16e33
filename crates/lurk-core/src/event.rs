//! Events recognized in a chat log.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use crate::types::Nick;

/// How a participant arrived or departed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceKind {
    Joined,
    Left,
    Quit,
}

impl PresenceKind {
    /// The word irssi prints after `has`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Left => "left",
            Self::Quit => "quit",
        }
    }
}

impl fmt::Display for PresenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined" => Ok(Self::Joined),
            "left" => Ok(Self::Left),
            "quit" => Ok(Self::Quit),
            _ => Err(format!("invalid presence action: {s}")),
        }
    }
}

/// A classified log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `--- Log opened` or `--- Day changed`: sets the day anchor.
    Header(NaiveDate),
    /// `--- Log closed`, or any timestamped line that is not about presence or talk.
    Discarded,
    Presence { kind: PresenceKind, who: Nick },
    Kicked { who: Nick },
    /// A chat line or an emote; both count as one line said.
    Message { who: Nick },
    NickChanged { from: Nick, to: Nick },
}

impl Event {
    /// Short label for logging and counters.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Header(_) => "header",
            Self::Discarded => "cruft",
            Self::Presence { kind, .. } => kind.as_str(),
            Self::Kicked { .. } => "kicked",
            Self::Message { .. } => "msg",
            Self::NickChanged { .. } => "nick",
        }
    }
}

/// One line of a log after classification.
///
/// `time` is the `HH:MM` prefix; header and log-closed lines have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub time: Option<NaiveTime>,
    pub event: Event,
}
