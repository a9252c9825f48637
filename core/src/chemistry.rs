//! Chemistry Regression Engine.
//!
//! Only exact 2-vs-2 matches with a positive point total are samples.
//! Label y = team-A point share, weight w = total points.
//!
//! Two ridge fits over the same rows:
//!   - baseline: one column per player (+1 team A, −1 team B)
//!   - full:     baseline columns + one column per teammate pair
//!
//! The baseline's clipped predictions give the residual per match. Per-player
//! R_i and per-pair aggregates are oriented to the player's or pair's own
//! side. Uplift is the pair's mean residual minus each member's R_i; the
//! chemistry coefficient is read straight off the full model's pair column.

use crate::{
    error::{check_lambda, LadderResult},
    record::MatchRecord,
    replay::chronological,
    ridge::{fit_weighted_ridge, SparseDesign},
    types::{MatchFormat, MatchId, PlayerId, TeamSide},
};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unordered pair of players, stored lowest id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey(pub PlayerId, pub PlayerId);

impl PairKey {
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }
}

/// One regression row.
#[derive(Debug, Clone, PartialEq)]
pub struct DoublesSample {
    pub match_id: MatchId,
    pub team_a: [PlayerId; 2],
    pub team_b: [PlayerId; 2],
    pub score_a: u32,
    pub score_b: u32,
}

impl DoublesSample {
    fn total(&self) -> f64 {
        (self.score_a + self.score_b) as f64
    }

    /// Team-A point share.
    fn point_share(&self) -> f64 {
        self.score_a as f64 / self.total()
    }

    fn pairs(&self) -> [(PairKey, TeamSide); 2] {
        [
            (PairKey::new(self.team_a[0], self.team_a[1]), TeamSide::A),
            (PairKey::new(self.team_b[0], self.team_b[1]), TeamSide::B),
        ]
    }

    fn players(&self) -> [(PlayerId, TeamSide); 4] {
        [
            (self.team_a[0], TeamSide::A),
            (self.team_a[1], TeamSide::A),
            (self.team_b[0], TeamSide::B),
            (self.team_b[1], TeamSide::B),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairChemistry {
    pub player_id_a: PlayerId,
    pub player_id_b: PlayerId,
    pub games_together: u32,
    pub beta_chemistry: f64,
    pub beta_t_stat: Option<f64>,
    pub uplift_a_given_b: f64,
    pub uplift_b_given_a: f64,
    pub avg_point_share: f64,
    pub avg_point_share_base: f64,
    pub last_updated: DateTime<Utc>,
}

/// Regression rows in chronological order. Anything that is not exactly two
/// per side, or has no points, is dropped here.
pub fn doubles_samples(matches: &[MatchRecord]) -> Vec<DoublesSample> {
    chronological(matches)
        .into_iter()
        .filter(|m| m.format == MatchFormat::Doubles && m.total_points() > 0)
        .filter_map(|m| {
            let (a, b) = (m.side(TeamSide::A), m.side(TeamSide::B));
            if a.len() != 2 || b.len() != 2 {
                return None;
            }
            Some(DoublesSample {
                match_id: m.id,
                team_a: [a[0], a[1]],
                team_b: [b[0], b[1]],
                score_a: m.score_a,
                score_b: m.score_b,
            })
        })
        .collect()
}

#[derive(Default)]
struct PairTally {
    games: u32,
    residual_sum: f64,
    share_sum: f64,
    share_base_sum: f64,
}

/// Full recompute over every eligible match. Returns one row per pair that
/// played together at least once, ordered by pair. An empty sample set yields
/// an empty table; a fit the solver cannot factor surfaces as
/// `InsufficientData`. Negative or non-finite lambdas are rejected with
/// `InvalidParameter` before any sample is looked at.
pub fn recompute_chemistry(
    matches: &[MatchRecord],
    lambda_alpha: f64,
    lambda_full: f64,
    now: DateTime<Utc>,
) -> LadderResult<Vec<PairChemistry>> {
    check_lambda("lambda_alpha", lambda_alpha)?;
    check_lambda("lambda_full", lambda_full)?;
    let samples = doubles_samples(matches);
    if samples.is_empty() {
        log::info!("chemistry: no eligible doubles matches");
        return Ok(Vec::new());
    }

    let mut player_index: BTreeMap<PlayerId, usize> = BTreeMap::new();
    let mut pair_index: BTreeMap<PairKey, usize> = BTreeMap::new();
    for s in &samples {
        for (pid, _) in s.players() {
            player_index.insert(pid, 0);
        }
        for (pair, _) in s.pairs() {
            pair_index.insert(pair, 0);
        }
    }
    for (idx, slot) in player_index.values_mut().enumerate() {
        *slot = idx;
    }
    for (idx, slot) in pair_index.values_mut().enumerate() {
        *slot = idx;
    }

    let (m, p, q) = (samples.len(), player_index.len(), pair_index.len());
    let mut x_alpha = SparseDesign::new(m, p);
    let mut x_full = SparseDesign::new(m, p + q);
    let y: Array1<f64> = samples.iter().map(DoublesSample::point_share).collect();
    let w: Array1<f64> = samples.iter().map(DoublesSample::total).collect();

    for (row, s) in samples.iter().enumerate() {
        for (pid, side) in s.players() {
            let col = player_index[&pid];
            x_alpha.push(row, col, side.sign());
            x_full.push(row, col, side.sign());
        }
        for (pair, side) in s.pairs() {
            x_full.push(row, p + pair_index[&pair], side.sign());
        }
    }

    let baseline = fit_weighted_ridge(&x_alpha, &y, &w, lambda_alpha)?;
    let full = fit_weighted_ridge(&x_full, &y, &w, lambda_full)?;

    let p_base = baseline.predict(&x_alpha).mapv(|v| v.clamp(0.0, 1.0));
    let residuals = &y - &p_base;

    // R_i: mean residual from the player's own side.
    let mut player_res: BTreeMap<PlayerId, (f64, u32)> = BTreeMap::new();
    let mut pairs: BTreeMap<PairKey, PairTally> = BTreeMap::new();
    for (row, s) in samples.iter().enumerate() {
        for (pid, side) in s.players() {
            let entry = player_res.entry(pid).or_insert((0.0, 0));
            entry.0 += side.sign() * residuals[row];
            entry.1 += 1;
        }
        for (pair, side) in s.pairs() {
            let (share, share_base) = match side {
                TeamSide::A => (y[row], p_base[row]),
                TeamSide::B => (1.0 - y[row], 1.0 - p_base[row]),
            };
            let tally = pairs.entry(pair).or_default();
            tally.games += 1;
            tally.residual_sum += side.sign() * residuals[row];
            tally.share_sum += share;
            tally.share_base_sum += share_base;
        }
    }
    let r_i = |pid: PlayerId| {
        player_res
            .get(&pid)
            .filter(|(_, n)| *n > 0)
            .map_or(0.0, |(sum, n)| sum / f64::from(*n))
    };

    let rows: Vec<PairChemistry> = pairs
        .iter()
        .map(|(pair, t)| {
            let games = f64::from(t.games);
            let pair_residual = t.residual_sum / games;
            let col = p + pair_index[pair];
            PairChemistry {
                player_id_a: pair.0,
                player_id_b: pair.1,
                games_together: t.games,
                beta_chemistry: full.coef[col],
                beta_t_stat: full.t_stats.as_ref().and_then(|ts| ts[col]),
                uplift_a_given_b: pair_residual - r_i(pair.0),
                uplift_b_given_a: pair_residual - r_i(pair.1),
                avg_point_share: t.share_sum / games,
                avg_point_share_base: t.share_base_sum / games,
                last_updated: now,
            }
        })
        .collect();

    log::info!(
        "chemistry: {m} samples, {p} players, {} pairs (lambda_alpha={lambda_alpha}, lambda_full={lambda_full})",
        rows.len()
    );
    Ok(rows)
}
