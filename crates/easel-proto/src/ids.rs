//! Identifier types shared across the protocol.
//!
//! Session and element ids are server-assigned sequential counters. They stay
//! far below 2^53, so serializing them as JSON numbers never loses precision.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-assigned identifier for one connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier for a drawn element.
///
/// Unique across every room in the process for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a collaborative whiteboard room.
///
/// Restricted to ASCII alphanumerics, `-`, and `_` (at most
/// [`RoomId::MAX_LEN`] bytes, non-empty) so ids are safe to embed in URLs and
/// storage keys without escaping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(String);

/// Errors from validating a room id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdError {
    /// The id was empty.
    #[error("room id is empty")]
    Empty,

    /// The id exceeded [`RoomId::MAX_LEN`] bytes.
    #[error("room id is longer than {} bytes", RoomId::MAX_LEN)]
    TooLong,

    /// The id contained a character outside the allowed set.
    #[error("room id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl RoomId {
    /// Maximum length of a room id, in bytes.
    pub const MAX_LEN: usize = 64;

    fn valid_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(RoomIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(RoomIdError::TooLong);
        }
        if let Some(c) = s.chars().find(|&c| !Self::valid_char(c)) {
            return Err(RoomIdError::InvalidCharacter(c));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
