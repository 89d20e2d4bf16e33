//! Core type definitions with validation.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid visit bucket label.
    #[error("invalid visit bucket: {value}")]
    InvalidBucket { value: String },
}

/// A validated participant name.
///
/// Nicks must be non-empty. Comparison is exact: irssi logs preserve the
/// case a participant chose, and two spellings are two names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nick(String);

impl Nick {
    /// Creates a new nick after validation.
    pub fn new(nick: impl Into<String>) -> Result<Self, ValidationError> {
        let nick = nick.into();
        if nick.is_empty() {
            return Err(ValidationError::Empty { field: "nick" });
        }
        Ok(Self(nick))
    }

    /// Returns the nick as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nick {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Nick> for String {
    fn from(nick: Nick) -> Self {
        nick.0
    }
}

impl fmt::Display for Nick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Nick {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Nick {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Coarse classification of a visit by how many lines were said during it.
///
/// Ordered from quietest to chattiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Zero,
    One,
    Ten,
    Hundred,
    Unbounded,
}

impl Bucket {
    /// All buckets, quietest first.
    pub const ALL: [Self; 5] = [
        Self::Zero,
        Self::One,
        Self::Ten,
        Self::Hundred,
        Self::Unbounded,
    ];

    /// Picks the smallest bounded bucket holding `lines`, or `Unbounded`.
    #[must_use]
    pub const fn for_lines(lines: u64) -> Self {
        match lines {
            0 => Self::Zero,
            1 => Self::One,
            2..=10 => Self::Ten,
            11..=100 => Self::Hundred,
            _ => Self::Unbounded,
        }
    }

    /// String representation used in the state document.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Ten => "10",
            Self::Hundred => "100",
            Self::Unbounded => "unbounded",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Self::Zero),
            "1" => Ok(Self::One),
            "10" => Ok(Self::Ten),
            "100" => Ok(Self::Hundred),
            "unbounded" => Ok(Self::Unbounded),
            _ => Err(ValidationError::InvalidBucket {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for Bucket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Bucket {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
