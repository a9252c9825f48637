//! Shared primitive types used across the entire ladder.

use crate::error::{LadderError, LadderResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable player identity (SQLite rowid).
pub type PlayerId = i64;

/// Stable match identity (SQLite rowid). Also the chronological tie-break.
pub type MatchId = i64;

/// Integer rating as persisted on players and participations.
pub type Rating = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchFormat {
    Singles,
    Doubles,
}

impl MatchFormat {
    /// Players per side for this format.
    pub fn side_size(self) -> usize {
        match self {
            MatchFormat::Singles => 1,
            MatchFormat::Doubles => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchFormat::Singles => "singles",
            MatchFormat::Doubles => "doubles",
        }
    }

    /// Parse a stored or user-supplied format string (case-insensitive).
    pub fn parse(raw: &str) -> LadderResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "singles" => Ok(MatchFormat::Singles),
            "doubles" => Ok(MatchFormat::Doubles),
            other => Err(LadderError::composition(format!(
                "unknown match format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeamSide {
    A,
    B,
}

impl TeamSide {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamSide::A => "A",
            TeamSide::B => "B",
        }
    }

    pub fn parse(raw: &str) -> LadderResult<Self> {
        match raw.trim() {
            "A" | "a" => Ok(TeamSide::A),
            "B" | "b" => Ok(TeamSide::B),
            other => Err(LadderError::composition(format!(
                "unknown team side '{other}'"
            ))),
        }
    }

    /// +1.0 for side A, -1.0 for side B. Orients team-A quantities to this side.
    pub fn sign(self) -> f64 {
        match self {
            TeamSide::A => 1.0,
            TeamSide::B => -1.0,
        }
    }
}
