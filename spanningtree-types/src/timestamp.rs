//! Wall-clock timestamps used for last-write-wins.
//!
//! Seconds since the Unix epoch. The sync layer treats the value carried on
//! a record as the only source of truth for recency; it is never validated
//! against the receiver's clock.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Next timestamp for a local mutation of a record last stamped `previous`.
    ///
    /// Never returns a value `<= previous`, even when the wall clock has not
    /// advanced or has stepped backwards.
    #[must_use]
    pub fn next_after(previous: Option<Self>) -> Self {
        let now = Self::now();
        match previous {
            Some(prev) if now.0 <= prev.0 => Self(prev.0.saturating_add(1)),
            _ => now,
        }
    }

    #[must_use]
    pub const fn saturating_sub_secs(&self, secs: i64) -> Self {
        Self(self.0.saturating_sub(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
