//! History Replay Engine.
//!
//! Replays the Rating Update Model over the whole chronological history,
//! starting every rostered player at the base rating, and segments the
//! timeline into reigns of whoever is top-rated.
//!
//! ORDERING (fixed, never changed):
//!   - Matches:    (played_at, match id) ascending.
//!   - Top player: highest working rating; ties go to the lowest player id.
//!
//! CROWNS:
//!   - A reign closed by a takeover earns one crown if it lasted at least
//!     `crown_threshold_days` fractional days.
//!   - The still-open reign is closed virtually against `now` for reporting.
//!     Its `earned_crown` is recomputed on every call and never enters the
//!     crown map, so repeated replays stay idempotent.

use crate::{
    config::LadderConfig,
    error::{LadderError, LadderResult},
    rating::{apply_match, check_composition, RatingChange, RatingDeltas},
    record::{MatchRecord, Player},
    types::{MatchId, PlayerId, Rating},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reign {
    pub king_id: PlayerId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Floor of the elapsed fractional days.
    pub days: i64,
    /// Compared against the threshold in fractional days, not `days`.
    pub earned_crown: bool,
    /// True for the virtual segment closed against "now".
    pub open: bool,
}

/// Before/after ratings written back onto one participation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationSnapshot {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub rating_before: Rating,
    pub rating_after: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub final_ratings: BTreeMap<PlayerId, Rating>,
    /// In replay order.
    pub snapshots: Vec<ParticipationSnapshot>,
    /// Closed reigns in order, then the open one (if any matches exist).
    pub reigns: Vec<Reign>,
    /// Every rostered player, zero included.
    pub crowns: BTreeMap<PlayerId, u32>,
    pub matches_replayed: usize,
}

impl ReplayOutcome {
    /// The reign still running at the end of history.
    pub fn current_reign(&self) -> Option<&Reign> {
        self.reigns.last().filter(|r| r.open)
    }

    /// Replayed deltas for a single match.
    pub fn deltas_for(&self, match_id: MatchId) -> RatingDeltas {
        self.snapshots
            .iter()
            .filter(|s| s.match_id == match_id)
            .map(|s| {
                (
                    s.player_id,
                    RatingChange { before: s.rating_before, after: s.rating_after },
                )
            })
            .collect()
    }
}

/// Elapsed fractional days between two instants, never negative.
pub fn elapsed_days(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0)
}

/// Highest rating wins; ties resolve to the lowest player id.
pub fn top_player(ratings: &BTreeMap<PlayerId, Rating>) -> Option<PlayerId> {
    let mut best: Option<(PlayerId, Rating)> = None;
    // BTreeMap iterates ascending by id, so a strict `>` keeps the lowest id on ties.
    for (&id, &rating) in ratings {
        if best.map_or(true, |(_, r)| rating > r) {
            best = Some((id, rating));
        }
    }
    best.map(|(id, _)| id)
}

/// Sort key shared by every consumer of chronological history.
pub fn chronological(matches: &[MatchRecord]) -> Vec<&MatchRecord> {
    let mut ordered: Vec<&MatchRecord> = matches.iter().collect();
    ordered.sort_by_key(|m| (m.played_at, m.id));
    ordered
}

struct ReignTracker<'a> {
    config: &'a LadderConfig,
    current: Option<(PlayerId, DateTime<Utc>)>,
    reigns: Vec<Reign>,
    crowns: BTreeMap<PlayerId, u32>,
}

impl ReignTracker<'_> {
    fn observe(&mut self, top: PlayerId, at: DateTime<Utc>) {
        match self.current {
            None => self.current = Some((top, at)),
            Some((king, _)) if king == top => {}
            Some((king, start)) => {
                self.close(king, start, at, false);
                self.current = Some((top, at));
            }
        }
    }

    fn close(&mut self, king_id: PlayerId, start: DateTime<Utc>, end: DateTime<Utc>, open: bool) {
        let days_total = elapsed_days(start, end);
        let earned_crown = days_total >= self.config.reign.crown_threshold_days;
        if earned_crown && !open {
            *self.crowns.entry(king_id).or_insert(0) += 1;
        }
        self.reigns.push(Reign {
            king_id,
            start,
            end,
            days: days_total.floor() as i64,
            earned_crown,
            open,
        });
    }
}

/// Replay the full history from scratch.
///
/// Every match is validated up front: a malformed composition or a
/// participant missing from the roster fails the whole replay rather than
/// inventing a base-rated stranger. Nothing is persisted
/// here: the caller writes the outcome inside its own transaction.
pub fn replay_full_history(
    roster: &[Player],
    matches: &[MatchRecord],
    now: DateTime<Utc>,
    config: &LadderConfig,
) -> LadderResult<ReplayOutcome> {
    let base = config.rating.base_rating;
    let mut ratings: BTreeMap<PlayerId, Rating> = roster.iter().map(|p| (p.id, base)).collect();

    for m in matches {
        check_composition(m.format, m.participants.iter().map(|p| (p.player_id, p.team_side)))?;
        if let Some(p) = m.participants.iter().find(|p| !ratings.contains_key(&p.player_id)) {
            return Err(LadderError::UnknownPlayer {
                player_id: p.player_id,
                match_id: Some(m.id),
            });
        }
    }

    let mut tracker = ReignTracker {
        config,
        current: None,
        reigns: Vec::new(),
        crowns: roster.iter().map(|p| (p.id, 0)).collect(),
    };
    let mut snapshots = Vec::new();
    let ordered = chronological(matches);

    for m in &ordered {
        let inputs = m.rating_inputs(|id| ratings.get(&id).copied().unwrap_or(base));
        let deltas = apply_match(m.format, m.score_a, m.score_b, &inputs, &config.rating)?;

        for (&player_id, change) in &deltas {
            ratings.insert(player_id, change.after);
            snapshots.push(ParticipationSnapshot {
                match_id: m.id,
                player_id,
                rating_before: change.before,
                rating_after: change.after,
            });
        }

        if let Some(top) = top_player(&ratings) {
            tracker.observe(top, m.played_at);
        }
    }

    if let Some((king, start)) = tracker.current {
        tracker.close(king, start, now, true);
    }

    log::debug!(
        "replay: {} matches, {} reigns, {} crowns",
        ordered.len(),
        tracker.reigns.len(),
        tracker.crowns.values().sum::<u32>()
    );

    Ok(ReplayOutcome {
        final_ratings: ratings,
        snapshots,
        reigns: tracker.reigns,
        crowns: tracker.crowns,
        matches_replayed: ordered.len(),
    })
}
