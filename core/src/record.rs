//! Players, matches and participations as the store hands them to the
//! engines, plus the intake shape for a new match.

use crate::{
    error::LadderResult,
    rating::{check_composition, ParticipantInput},
    types::{MatchFormat, MatchId, PlayerId, Rating, TeamSide},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Written only by a history replay.
    pub rating: Rating,
    /// Total overwrite on each persisted replay, never incremented.
    pub crowns_collected: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub player_id: PlayerId,
    pub team_side: TeamSide,
    pub winners: u32,
    pub errors: u32,
    /// `None` only between insert and the replay that runs in the same
    /// transaction.
    pub rating_before: Option<Rating>,
    pub rating_after: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub format: MatchFormat,
    pub score_a: u32,
    pub score_b: u32,
    pub played_at: DateTime<Utc>,
    pub source: String,
    pub participants: Vec<Participation>,
}

impl MatchRecord {
    /// Players on `side`, in stored order.
    pub fn side(&self, side: TeamSide) -> Vec<PlayerId> {
        self.participants
            .iter()
            .filter(|p| p.team_side == side)
            .map(|p| p.player_id)
            .collect()
    }

    pub fn total_points(&self) -> u32 {
        self.score_a + self.score_b
    }

    /// Points won and conceded from `side`'s point of view.
    pub fn points_for(&self, side: TeamSide) -> (u32, u32) {
        match side {
            TeamSide::A => (self.score_a, self.score_b),
            TeamSide::B => (self.score_b, self.score_a),
        }
    }

    /// A tie is a loss for both sides.
    pub fn side_won(&self, side: TeamSide) -> bool {
        let (won, lost) = self.points_for(side);
        won > lost
    }

    /// Rating-model input built from `rating_of` rather than the stored
    /// snapshot, so a rebuild never trusts stale `rating_before` values.
    pub fn rating_inputs(&self, rating_of: impl Fn(PlayerId) -> Rating) -> Vec<ParticipantInput> {
        self.participants
            .iter()
            .map(|p| ParticipantInput {
                player_id: p.player_id,
                team_side: p.team_side,
                winners: p.winners,
                errors: p.errors,
                rating_before: rating_of(p.player_id),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub player_id: PlayerId,
    pub team_side: TeamSide,
    #[serde(default)]
    pub winners: u32,
    #[serde(default)]
    pub errors: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatch {
    pub format: MatchFormat,
    pub score_a: u32,
    pub score_b: u32,
    /// Defaults to the engine clock's "now".
    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<String>,
    pub participants: Vec<NewParticipant>,
}

impl NewMatch {
    pub fn validate(&self) -> LadderResult<()> {
        check_composition(
            self.format,
            self.participants.iter().map(|p| (p.player_id, p.team_side)),
        )
    }

    /// When nobody tracked winners/errors, derive them from the scoreline:
    /// each side's points are split as evenly as possible across its players
    /// (remainder to the earlier-listed player), errors likewise from the
    /// opponent's score.
    pub fn autofill_contributions(&mut self) {
        if self.participants.iter().any(|p| p.winners != 0 || p.errors != 0) {
            return;
        }
        for side in [TeamSide::A, TeamSide::B] {
            let (won, lost) = match side {
                TeamSide::A => (self.score_a, self.score_b),
                TeamSide::B => (self.score_b, self.score_a),
            };
            let members: Vec<usize> = self
                .participants
                .iter()
                .enumerate()
                .filter(|(_, p)| p.team_side == side)
                .map(|(i, _)| i)
                .collect();
            let winners = split_points(won, members.len());
            let errors = split_points(lost, members.len());
            for (slot, idx) in members.into_iter().enumerate() {
                self.participants[idx].winners = winners[slot];
                self.participants[idx].errors = errors[slot];
            }
        }
    }
}

/// Split `total` into `n` near-equal integer parts, remainder to the front.
fn split_points(total: u32, n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let n32 = n as u32;
    let (base, rem) = (total / n32, total % n32);
    (0..n32).map(|i| base + u32::from(i < rem)).collect()
}
