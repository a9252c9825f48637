//! Audit events appended to `event_log` by every write path.
//!
//! RULE: events are written inside the same transaction as the state they
//! describe, so the log never mentions a recompute that rolled back.

use crate::types::{MatchFormat, MatchId, PlayerId};
use serde::{Deserialize, Serialize};

/// Variants are only ever added, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LadderEvent {
    // ── Match history ──────────────────────────────
    MatchRecorded {
        match_id: MatchId,
        format: MatchFormat,
        score_a: u32,
        score_b: u32,
    },
    MatchRescored {
        match_id: MatchId,
        score_a: u32,
        score_b: u32,
    },
    MatchDeleted {
        match_id: MatchId,
    },

    // ── Replay ─────────────────────────────────────
    HistoryReplayed {
        matches: usize,
        players: usize,
        reigns: usize,
        crowns_awarded: u32,
        king_id: Option<PlayerId>,
    },

    // ── Chemistry ──────────────────────────────────
    ChemistryRecomputed {
        samples: usize,
        pairs: usize,
        lambda_alpha: f64,
        lambda_full: f64,
    },
    ChemistrySkipped {
        reason: String,
    },
}

impl LadderEvent {
    /// Stable string name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            LadderEvent::MatchRecorded { .. }       => "match_recorded",
            LadderEvent::MatchRescored { .. }       => "match_rescored",
            LadderEvent::MatchDeleted { .. }        => "match_deleted",
            LadderEvent::HistoryReplayed { .. }     => "history_replayed",
            LadderEvent::ChemistryRecomputed { .. } => "chemistry_recomputed",
            LadderEvent::ChemistrySkipped { .. }    => "chemistry_skipped",
        }
    }
}

/// A row in the event_log table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub event_type: String,
    pub payload: String,
    pub created_at_ms: i64,
}
