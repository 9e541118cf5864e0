//! Filter verdicts
//!
//! A filter answers every candidate object with one of three statuses.
//! `Rejected` always dominates, `Allowed` comes next and `Undecided` is the
//! default when nothing has an opinion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of checking one candidate object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// No opinion; the decision is left to the caller or another filter.
    #[default]
    Undecided,
    /// The object may be created.
    Allowed,
    /// The object must not be created.
    Rejected,
}

impl Status {
    /// Rank used when two verdicts are combined.
    fn rank(self) -> u8 {
        match self {
            Status::Undecided => 0,
            Status::Allowed => 1,
            Status::Rejected => 2,
        }
    }

    /// Combine two verdicts: rejected beats allowed, allowed beats undecided.
    pub fn combine(self, other: Status) -> Status {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn is_rejected(self) -> bool {
        self == Status::Rejected
    }

    pub fn is_allowed(self) -> bool {
        self == Status::Allowed
    }

    pub fn is_undecided(self) -> bool {
        self == Status::Undecided
    }

    /// Upper-case name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Undecided => "UNDECIDED",
            Status::Allowed => "ALLOWED",
            Status::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
