//! Per-player career summary: win/loss splits, contribution and liability
//! indices, archetype labels and rating history.

use crate::{
    record::{MatchRecord, Player},
    replay::chronological,
    types::{MatchFormat, MatchId, Rating},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Archetype labels need at least this many matches.
pub const ARCHETYPE_MIN_MATCHES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    #[serde(rename = "Playmaker")]
    Playmaker,
    #[serde(rename = "Savage Attacker")]
    SavageAttacker,
    #[serde(rename = "Team Carry")]
    TeamCarry,
    #[serde(rename = "Reliable Defender")]
    ReliableDefender,
    #[serde(rename = "The Wall")]
    TheWall,
    #[serde(rename = "Reckless Attacker")]
    RecklessAttacker,
    #[serde(rename = "Wildcard")]
    Wildcard,
    #[serde(rename = "Team Liability")]
    TeamLiability,
    #[serde(rename = "Closer")]
    Closer,
    #[serde(rename = "Team Player")]
    TeamPlayer,
    #[serde(rename = "Singles Specialist")]
    SinglesSpecialist,
    #[serde(rename = "Doubles Specialist")]
    DoublesSpecialist,
    #[serde(rename = "Versatile")]
    Versatile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub wins: u32,
    pub losses: u32,
    pub total_matches: u32,
    pub wins_singles: u32,
    pub losses_singles: u32,
    pub wins_doubles: u32,
    pub losses_doubles: u32,
    pub total_winners: u32,
    pub total_errors: u32,
    pub net_winners: i64,
    pub avg_winners_per_match: f64,
    pub avg_errors_per_match: f64,
    pub net_winners_per_match: f64,
    pub win_rate: f64,
    pub singles_win_rate: f64,
    pub doubles_win_rate: f64,
    /// Contribution index.
    pub ci: f64,
    /// Liability index.
    pub li: f64,
    pub archetypes: Vec<Archetype>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMatch {
    pub match_id: MatchId,
    pub played_at: DateTime<Utc>,
    pub format: MatchFormat,
    pub won: bool,
    pub score_for: u32,
    pub score_against: u32,
    pub winners: u32,
    pub errors: u32,
    pub rating_before: Option<Rating>,
    pub rating_after: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player: Player,
    pub stats: PlayerStats,
    /// Chronological.
    pub matches: Vec<ProfileMatch>,
    pub rating_history: Vec<(DateTime<Utc>, Rating)>,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

pub fn build_profile(player: Player, history: &[MatchRecord]) -> PlayerProfile {
    let mut stats = PlayerStats::default();
    let mut matches = Vec::new();
    let (mut team_won, mut team_lost) = (0u64, 0u64);

    for m in chronological(history) {
        let Some(part) = m.participants.iter().find(|p| p.player_id == player.id) else {
            continue;
        };
        let won = m.side_won(part.team_side);
        let (score_for, score_against) = m.points_for(part.team_side);

        if won { stats.wins += 1 } else { stats.losses += 1 }
        match (m.format, won) {
            (MatchFormat::Singles, true)  => stats.wins_singles += 1,
            (MatchFormat::Singles, false) => stats.losses_singles += 1,
            (MatchFormat::Doubles, true)  => stats.wins_doubles += 1,
            (MatchFormat::Doubles, false) => stats.losses_doubles += 1,
        }
        stats.total_winners += part.winners;
        stats.total_errors += part.errors;
        team_won += u64::from(score_for);
        team_lost += u64::from(score_against);

        matches.push(ProfileMatch {
            match_id: m.id,
            played_at: m.played_at,
            format: m.format,
            won,
            score_for,
            score_against,
            winners: part.winners,
            errors: part.errors,
            rating_before: part.rating_before,
            rating_after: part.rating_after,
        });
    }

    let n = f64::from(stats.wins + stats.losses);
    stats.total_matches = stats.wins + stats.losses;
    stats.net_winners = i64::from(stats.total_winners) - i64::from(stats.total_errors);
    stats.avg_winners_per_match = ratio(f64::from(stats.total_winners), n);
    stats.avg_errors_per_match = ratio(f64::from(stats.total_errors), n);
    stats.net_winners_per_match = ratio(stats.net_winners as f64, n);
    stats.win_rate = ratio(f64::from(stats.wins), n);
    stats.singles_win_rate = ratio(
        f64::from(stats.wins_singles),
        f64::from(stats.wins_singles + stats.losses_singles),
    );
    stats.doubles_win_rate = ratio(
        f64::from(stats.wins_doubles),
        f64::from(stats.wins_doubles + stats.losses_doubles),
    );

    // Net winners per match is assumed to live roughly in [-4, 4].
    let winner_share = ratio(f64::from(stats.total_winners), team_won as f64);
    let norm_net = ((stats.net_winners_per_match + 4.0) / 8.0).clamp(0.0, 1.0);
    stats.ci = 0.6 * winner_share + 0.4 * norm_net;
    stats.li = ratio(f64::from(stats.total_errors), team_lost as f64);
    stats.archetypes = archetypes(&stats);

    let rating_history = matches
        .iter()
        .filter_map(|m| m.rating_after.map(|r| (m.played_at, r)))
        .collect();

    PlayerProfile { player, stats, matches, rating_history }
}

fn archetypes(s: &PlayerStats) -> Vec<Archetype> {
    use Archetype::*;

    if s.total_matches < ARCHETYPE_MIN_MATCHES {
        return Vec::new();
    }
    let singles_games = s.wins_singles + s.losses_singles;
    let doubles_games = s.wins_doubles + s.losses_doubles;
    let (net, win, ci, li) = (s.net_winners_per_match, s.win_rate, s.ci, s.li);
    let (avg_w, avg_e) = (s.avg_winners_per_match, s.avg_errors_per_match);
    let (sr, dr) = (s.singles_win_rate, s.doubles_win_rate);

    let rules = [
        // offense
        (Playmaker, net >= 5.0 && ci >= 0.55),
        (SavageAttacker, avg_w >= 5.0 && ci >= 0.6),
        (TeamCarry, ci >= 0.65 && win >= 0.55),
        // defense
        (ReliableDefender, avg_e > 0.7 && avg_e <= 1.0 && li <= 0.35 && win >= 0.5),
        (TheWall, avg_e <= 0.7 && li <= 0.25 && win >= 0.65),
        // variance
        (RecklessAttacker, avg_w >= 4.0 && avg_e >= 3.0),
        (Wildcard, ci >= 0.55 && li >= 0.35),
        (TeamLiability, li >= 0.5 && win <= 0.5),
        // mentality
        (Closer, win >= 0.65 && net >= 1.5),
        (TeamPlayer, (-0.5..=0.5).contains(&net) && (0.45..=0.6).contains(&win)),
        // format
        (SinglesSpecialist, singles_games >= 3 && sr >= 0.6 && sr >= dr + 0.10),
        (DoublesSpecialist, doubles_games >= 3 && dr >= 0.6 && dr >= sr + 0.10),
        (
            Versatile,
            singles_games >= 3 && doubles_games >= 3 && sr >= 0.55 && dr >= 0.55 && (sr - dr).abs() <= 0.10,
        ),
    ];
    rules.into_iter().filter(|(_, hit)| *hit).map(|(a, _)| a).collect()
}
