//! Line grammar for irssi-style channel logs.
//!
//! Every line is either a header (`--- Log opened ...`, `--- Day changed ...`),
//! a log-closed marker, or a `HH:MM ` timestamp followed by content. Timestamped
//! content is matched against an ordered list of forms, falling back to
//! [`Event::Discarded`]. A line that is none of these is an error: logs are
//! never skipped silently.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::{Captures, Regex};
use thiserror::Error;

use crate::event::{Event, LogLine, PresenceKind};
use crate::types::Nick;

const LOG_OPENED: &str = "--- Log opened ";
const DAY_CHANGED: &str = "--- Day changed ";
const LOG_CLOSED: &str = "--- Log closed ";

/// Errors that make a line, and therefore its whole file, unreadable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// The line has no `HH:MM ` prefix and is not a header.
    #[error("line has no HH:MM timestamp: {line:?}")]
    MissingTimestamp { line: String },

    /// The prefix looked like a timestamp but is not a time of day.
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    /// A header whose date description could not be parsed.
    #[error("unparseable header date: {text:?}")]
    HeaderDate { text: String },
}

// Name token: a run without space, ':' or '>', optionally followed by a
// ':'-introduced decoration that is dropped.
macro_rules! nick {
    () => {
        r"([^ :>\n]+)(?::[^ >\n]+)?"
    };
}

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2}):([0-9]{2}) ").unwrap());

static PRESENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\(-\) ",
        nick!(),
        r" [^ \n]+ has (joined|left|quit) "
    ))
    .unwrap()
});

static KICKED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(concat!(r"^\(-\) ", nick!(), r" was kicked ")).unwrap());

// A bare glyph such as `<@>` is not a name.
static PRIVMSG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<[ @+%&~!]?([^ @+%&~!:>\n][^ :>\n]*)(?::[^ >\n]+)?> ").unwrap()
});

static EMOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(concat!(r"^ \* ", nick!(), r" ")).unwrap());

static NICK_CHANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\(-\) ",
        nick!(),
        r" is now known as ",
        nick!()
    ))
    .unwrap()
});

const DATETIME_FORMATS: &[&str] = &[
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%b %d %Y", "%Y-%m-%d", "%d %b %Y", "%B %d %Y", "%d %B %Y"];

/// Classifies a single line (without its trailing newline).
pub fn classify_line(line: &str) -> Result<LogLine, ClassifyError> {
    let header = line
        .strip_prefix(LOG_OPENED)
        .or_else(|| line.strip_prefix(DAY_CHANGED));
    if let Some(when) = header {
        let date = parse_header_date(when).ok_or_else(|| ClassifyError::HeaderDate {
            text: when.to_string(),
        })?;
        return Ok(LogLine {
            time: None,
            event: Event::Header(date),
        });
    }

    if line.starts_with(LOG_CLOSED) {
        return Ok(LogLine {
            time: None,
            event: Event::Discarded,
        });
    }

    let Some(caps) = TIMESTAMP_RE.captures(line) else {
        return Err(ClassifyError::MissingTimestamp {
            line: line.to_string(),
        });
    };
    let hour: u32 = caps[1].parse().unwrap_or(u32::MAX);
    let minute: u32 = caps[2].parse().unwrap_or(u32::MAX);
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or(ClassifyError::InvalidTime { hour, minute })?;

    let rest = &line[caps[0].len()..];
    Ok(LogLine {
        time: Some(time),
        event: classify_content(rest),
    })
}

/// Matches timestamped content. Always succeeds; unknown content is cruft.
///
/// Presence must be tried before `kicked`: both start with `(-) <nick> `, and
/// "kicked" is not one of the presence words, so the order keeps them apart.
fn classify_content(rest: &str) -> Event {
    if let Some(caps) = PRESENCE_RE.captures(rest) {
        if let (Some(who), Ok(kind)) = (nick_at(&caps, 1), caps[2].parse::<PresenceKind>()) {
            return Event::Presence { kind, who };
        }
    }
    if let Some(who) = KICKED_RE.captures(rest).and_then(|c| nick_at(&c, 1)) {
        return Event::Kicked { who };
    }
    if let Some(who) = PRIVMSG_RE.captures(rest).and_then(|c| nick_at(&c, 1)) {
        return Event::Message { who };
    }
    if let Some(who) = EMOTE_RE.captures(rest).and_then(|c| nick_at(&c, 1)) {
        return Event::Message { who };
    }
    if let Some(caps) = NICK_CHANGE_RE.captures(rest) {
        if let (Some(from), Some(to)) = (nick_at(&caps, 1), nick_at(&caps, 2)) {
            return Event::NickChanged { from, to };
        }
    }
    Event::Discarded
}

fn nick_at(caps: &Captures<'_>, group: usize) -> Option<Nick> {
    caps.get(group).and_then(|m| Nick::new(m.as_str()).ok())
}

/// Parses the free-form date after a header marker.
///
/// Accepts irssi's `Mon Jan 01 00:00:00 2020` and `Mon Jan 01 2020` along
/// with a few ISO and day-first layouts. A leading weekday is dropped without
/// checking it against the date; only the calendar date is kept.
pub fn parse_header_date(text: &str) -> Option<NaiveDate> {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens
        .first()
        .is_some_and(|t| t.trim_end_matches(',').parse::<Weekday>().is_ok())
    {
        tokens.remove(0);
    }
    let normalized = tokens.join(" ");
    if normalized.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
        })
}
