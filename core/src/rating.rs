//! Rating Update Model: one match's scoreline in, before/after ratings out.
//!
//! Pure functions only. Nothing here reads the store or the clock; the
//! History Replay Engine is the sole caller that feeds results back into
//! persisted state.
//!
//! Conventions:
//!   - `score_a <= score_b` means side A lost (ties and 0-0 included).
//!   - Team-level deltas are exact negatives of each other.
//!   - Integer deltas are zero-sum as well: each team delta is rounded once
//!     and the per-player split hands the rounding remainder to the partner.

use crate::{
    config::RatingConfig,
    error::{LadderError, LadderResult},
    types::{MatchFormat, PlayerId, Rating, TeamSide},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What the model needs to know about one player in one match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub player_id: PlayerId,
    pub team_side: TeamSide,
    /// Points this player won directly.
    pub winners: u32,
    /// Points this player lost directly.
    pub errors: u32,
    pub rating_before: Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub before: Rating,
    pub after: Rating,
}

impl RatingChange {
    pub fn delta(&self) -> Rating {
        self.after - self.before
    }
}

/// Per-player result of a single match, ordered by player id.
pub type RatingDeltas = BTreeMap<PlayerId, RatingChange>;

/// Logistic expectation of `r_self` scoring against `r_opp`.
pub fn expected(r_self: f64, r_opp: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((r_opp - r_self) / 400.0))
}

/// Margin-of-victory multiplier. Tight games sit near 1x, blowouts approach
/// the configured cap.
pub fn margin_multiplier(score_a: u32, score_b: u32, config: &RatingConfig) -> f64 {
    let diff = score_a.abs_diff(score_b) as f64;
    let max_points = score_a.max(score_b).max(1) as f64;
    let raw = 1.0 + diff / max_points;
    raw.clamp(config.min_margin_multiplier, config.max_margin_multiplier)
}

/// Reject any participant list that does not match the declared format:
/// exactly `side_size` players per side and no player listed twice.
pub fn check_composition(
    format: MatchFormat,
    sides: impl IntoIterator<Item = (PlayerId, TeamSide)>,
) -> LadderResult<()> {
    let mut seen = BTreeSet::new();
    let (mut side_a, mut side_b) = (0usize, 0usize);
    for (player_id, side) in sides {
        if !seen.insert(player_id) {
            return Err(LadderError::composition(format!(
                "player {player_id} appears more than once"
            )));
        }
        match side {
            TeamSide::A => side_a += 1,
            TeamSide::B => side_b += 1,
        }
    }
    let want = format.side_size();
    if side_a != want || side_b != want {
        return Err(LadderError::composition(format!(
            "{format} needs {want} player(s) per side, got {side_a} on A and {side_b} on B"
        )));
    }
    Ok(())
}

/// Dispatch on format. Fails before computing anything if the participant
/// shape does not match.
pub fn apply_match(
    format: MatchFormat,
    score_a: u32,
    score_b: u32,
    participants: &[ParticipantInput],
    config: &RatingConfig,
) -> LadderResult<RatingDeltas> {
    check_composition(format, participants.iter().map(|p| (p.player_id, p.team_side)))?;
    let (team_a, team_b): (Vec<&ParticipantInput>, Vec<&ParticipantInput>) = participants
        .iter()
        .partition(|p| p.team_side == TeamSide::A);

    match format {
        MatchFormat::Singles => Ok(apply_singles(score_a, score_b, team_a[0], team_b[0], config)),
        MatchFormat::Doubles => Ok(apply_doubles(
            score_a,
            score_b,
            [team_a[0], team_a[1]],
            [team_b[0], team_b[1]],
            config,
        )),
    }
}

/// (team-A delta, a_won) for the given team ratings. Team B's delta is the
/// exact negative.
fn team_delta(r_a: f64, r_b: f64, score_a: u32, score_b: u32, k_base: f64, config: &RatingConfig) -> (f64, bool) {
    let a_won = score_a > score_b;
    let actual_a = if a_won { 1.0 } else { 0.0 };
    let k_eff = k_base * margin_multiplier(score_a, score_b, config);
    (k_eff * (actual_a - expected(r_a, r_b)), a_won)
}

fn apply_singles(
    score_a: u32,
    score_b: u32,
    pa: &ParticipantInput,
    pb: &ParticipantInput,
    config: &RatingConfig,
) -> RatingDeltas {
    let (delta_a, _) = team_delta(
        pa.rating_before as f64,
        pb.rating_before as f64,
        score_a,
        score_b,
        config.k_singles,
        config,
    );
    let step = delta_a.round() as Rating;

    let mut out = RatingDeltas::new();
    out.insert(pa.player_id, RatingChange { before: pa.rating_before, after: pa.rating_before + step });
    out.insert(pb.player_id, RatingChange { before: pb.rating_before, after: pb.rating_before - step });
    out
}

fn apply_doubles(
    score_a: u32,
    score_b: u32,
    team_a: [&ParticipantInput; 2],
    team_b: [&ParticipantInput; 2],
    config: &RatingConfig,
) -> RatingDeltas {
    let mean = |t: &[&ParticipantInput; 2]| (t[0].rating_before + t[1].rating_before) as f64 / 2.0;
    let (delta_a, a_won) = team_delta(
        mean(&team_a),
        mean(&team_b),
        score_a,
        score_b,
        config.k_doubles,
        config,
    );
    let step_a = delta_a.round() as Rating;
    let eps = config.split_epsilon;
    let by_winners = |p: &ParticipantInput| p.winners as f64 + eps;
    let by_errors = |p: &ParticipantInput| p.errors as f64 + eps;

    let mut out = RatingDeltas::new();
    if a_won {
        split_team_delta(&mut out, team_a, step_a, by_winners);
        split_team_delta(&mut out, team_b, -step_a, by_errors);
    } else {
        split_team_delta(&mut out, team_a, step_a, by_errors);
        split_team_delta(&mut out, team_b, -step_a, by_winners);
    }
    out
}

/// Distribute an integer team delta across two teammates in proportion to
/// `weight`. The lower player id takes the rounded share, the partner takes
/// the remainder, so the two always sum to `team_step`.
fn split_team_delta(
    out: &mut RatingDeltas,
    team: [&ParticipantInput; 2],
    team_step: Rating,
    weight: impl Fn(&ParticipantInput) -> f64,
) {
    let (first, second) = if team[0].player_id <= team[1].player_id {
        (team[0], team[1])
    } else {
        (team[1], team[0])
    };
    let (w1, w2) = (weight(first), weight(second));
    let share_first = (team_step as f64 * w1 / (w1 + w2)).round() as Rating;
    let share_second = team_step - share_first;

    for (p, share) in [(first, share_first), (second, share_second)] {
        out.insert(
            p.player_id,
            RatingChange { before: p.rating_before, after: p.rating_before + share },
        );
    }
}
