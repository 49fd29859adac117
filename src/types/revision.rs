// ABOUTME: Source revision identifiers (commit hashes, tags, opaque tokens).
// ABOUTME: Immutable once observed; validated to be safe in logs, env vars, and git arguments.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("revision cannot be empty")]
    Empty,

    #[error("revision exceeds maximum length of {MAX_LEN} bytes")]
    TooLong,

    #[error("invalid character in revision: {0:?}")]
    InvalidChar(char),

    #[error("revision cannot start with '-'")]
    LeadingDash,
}

/// A point-in-time source state, usually a commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: &str) -> Result<Self, RevisionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RevisionError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(RevisionError::TooLong);
        }

        // Revisions are handed to git as arguments and must never parse as options.
        if value.starts_with('-') {
            return Err(RevisionError::LeadingDash);
        }

        if let Some(c) = value
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(RevisionError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
