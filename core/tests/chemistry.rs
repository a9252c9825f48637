//! Chemistry Regression Engine: sample selection, pair rows, uplift
//! consistency and replace semantics.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ladder_core::{
    chemistry::{doubles_samples, recompute_chemistry, PairChemistry},
    engine::LadderEngine,
    error::LadderError,
    record::{NewMatch, NewParticipant},
    types::{MatchFormat, MatchId, PlayerId, TeamSide},
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).unwrap()
}

fn doubles(a: [PlayerId; 2], b: [PlayerId; 2], score_a: u32, score_b: u32, played_at: DateTime<Utc>) -> NewMatch {
    let entrant = |player_id, team_side| NewParticipant { player_id, team_side, winners: 0, errors: 0 };
    NewMatch {
        format: MatchFormat::Doubles,
        score_a,
        score_b,
        played_at: Some(played_at),
        source: Some("test".into()),
        participants: vec![
            entrant(a[0], TeamSide::A),
            entrant(a[1], TeamSide::A),
            entrant(b[0], TeamSide::B),
            entrant(b[1], TeamSide::B),
        ],
    }
}

fn find(rows: &[PairChemistry], x: PlayerId, y: PlayerId) -> &PairChemistry {
    let (a, b) = if x < y { (x, y) } else { (y, x) };
    rows.iter()
        .find(|r| r.player_id_a == a && r.player_id_b == b)
        .unwrap_or_else(|| panic!("no chemistry row for ({a}, {b})"))
}

/// Four players rotating partners. P1+P2 blow everyone out together; every
/// other pairing plays level. Returns the engine, player ids and the ids of
/// the level matches where P1 partners P4.
fn rotation() -> (LadderEngine, [PlayerId; 4], Vec<MatchId>) {
    let engine = LadderEngine::build_test(t0() + Duration::days(10)).unwrap();
    let mut ids = [0; 4];
    for (slot, name) in ids.iter_mut().zip(["Ana", "Ben", "Cy", "Dee"]) {
        *slot = engine.create_player(name).unwrap().id;
    }
    let [p1, p2, p3, p4] = ids;

    let mut p1_p4 = Vec::new();
    let mut at = t0();
    for _ in 0..4 {
        engine.record_match(doubles([p1, p2], [p3, p4], 11, 2, at)).unwrap();
        engine.record_match(doubles([p1, p3], [p2, p4], 6, 6, at + Duration::hours(1))).unwrap();
        let level = engine.record_match(doubles([p1, p4], [p2, p3], 6, 6, at + Duration::hours(2))).unwrap();
        p1_p4.push(level.match_id);
        at += Duration::days(1);
    }
    (engine, ids, p1_p4)
}

#[test]
fn every_partnership_gets_one_row() {
    let (engine, [p1, p2, p3, p4], _) = rotation();
    let rows = engine.pair_chemistry().unwrap();

    assert_eq!(rows.len(), 6, "six distinct partnerships were played");
    for r in &rows {
        assert!(r.player_id_a < r.player_id_b, "pair key must be sorted");
        assert_eq!(r.games_together, 4);
        assert!(r.beta_chemistry.is_finite());
        assert!(r.uplift_a_given_b.is_finite() && r.uplift_b_given_a.is_finite());
    }
    let strong = find(&rows, p1, p2);
    assert!((strong.avg_point_share - 11.0 / 13.0).abs() < 1e-9);
    let level = find(&rows, p3, p1);
    assert!((level.avg_point_share - 0.5).abs() < 1e-9);
    let beaten = find(&rows, p4, p3);
    assert!((beaten.avg_point_share - 2.0 / 13.0).abs() < 1e-9, "B-side pair share is 1 - y");
}

#[test]
fn dominant_pair_has_the_largest_positive_beta() {
    let (engine, [p1, p2, p3, p4], _) = rotation();
    let rows = engine.pair_chemistry().unwrap();
    let strong = find(&rows, p1, p2);

    assert!(strong.beta_chemistry > 0.0, "got {}", strong.beta_chemistry);
    assert!(find(&rows, p3, p4).beta_chemistry < 0.0);
    for r in &rows {
        assert!(r.beta_chemistry <= strong.beta_chemistry, "{r:?} beats the dominant pair");
    }
    assert!(strong.uplift_a_given_b > 0.0, "partnership outperforms P1's baseline");
    assert!(strong.uplift_b_given_a > 0.0, "partnership outperforms P2's baseline");
}

#[test]
fn uplift_differences_are_consistent_across_pairs() {
    // uplift_a_given_b - uplift_b_given_a = R_b - R_a for every pair, so the
    // differences must chain: d(1,2) + d(2,3) = d(1,3).
    let (engine, [p1, p2, p3, _], _) = rotation();
    let rows = engine.pair_chemistry().unwrap();
    let d = |x, y| {
        let r = find(&rows, x, y);
        r.uplift_a_given_b - r.uplift_b_given_a
    };
    let lhs = d(p1, p2) + d(p2, p3);
    let rhs = d(p1, p3);
    assert!((lhs - rhs).abs() < 1e-9, "{lhs} != {rhs}");
}

#[test]
fn deleting_matches_replaces_the_table() {
    let (engine, [p1, p2, p3, p4], p1_p4) = rotation();
    for id in p1_p4 {
        engine.delete_match(id).unwrap();
    }
    let rows = engine.pair_chemistry().unwrap();
    assert_eq!(rows.len(), 4, "pairs that no longer played together must vanish");
    assert!(rows.iter().all(|r| (r.player_id_a, r.player_id_b) != (p1.min(p4), p1.max(p4))));
    assert!(rows.iter().all(|r| (r.player_id_a, r.player_id_b) != (p2.min(p3), p2.max(p3))));
    assert!(rows.iter().all(|r| r.games_together > 0));
}

#[test]
fn explicit_recompute_is_idempotent() {
    let (engine, _, _) = rotation();
    let first = engine.recompute_chemistry(1.0, 1.0).unwrap();
    let second = engine.recompute_chemistry(1.0, 1.0).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.store().pair_chemistry_count().unwrap(), 6);
}

#[test]
fn failed_recompute_keeps_previous_rows() {
    let (engine, _, _) = rotation();
    let before = engine.pair_chemistry().unwrap();

    // Player columns sum to zero in every row, so no penalty means no fit.
    let err = engine.recompute_chemistry(0.0, 1.0).unwrap_err();
    assert!(matches!(err, LadderError::InsufficientData { .. }), "got {err:?}");
    assert_eq!(engine.pair_chemistry().unwrap(), before);
}

#[test]
fn bad_lambda_is_an_invalid_parameter() {
    let (engine, _, _) = rotation();
    let before = engine.pair_chemistry().unwrap();

    for (alpha, full) in [(-1.0, 1.0), (1.0, f64::NAN), (f64::INFINITY, 1.0)] {
        let err = engine.recompute_chemistry(alpha, full).unwrap_err();
        assert!(matches!(err, LadderError::InvalidParameter { .. }), "({alpha}, {full}) gave {err:?}");
    }
    assert_eq!(engine.pair_chemistry().unwrap(), before);

    // Rejected even when there is nothing to fit.
    let err = recompute_chemistry(&[], -0.5, 1.0, t0()).unwrap_err();
    assert!(matches!(err, LadderError::InvalidParameter { .. }), "got {err:?}");
}

#[test]
fn t_stats_present_with_residual_degrees_of_freedom() {
    // 12 samples against 4 player + 6 pair columns.
    let (engine, [p1, p2, _, _], _) = rotation();
    let rows = engine.pair_chemistry().unwrap();
    for r in &rows {
        let t = r.beta_t_stat.unwrap_or_else(|| panic!("missing t-stat on {r:?}"));
        assert!(t.is_finite());
        assert_eq!(t > 0.0, r.beta_chemistry > 0.0, "t-stat sign must follow beta: {r:?}");
    }
    assert!(find(&rows, p1, p2).beta_t_stat.unwrap() > 0.0);
}

#[test]
fn singles_and_scoreless_matches_are_not_samples() {
    let engine = LadderEngine::build_test(t0() + Duration::days(1)).unwrap();
    let ids: Vec<PlayerId> = ["Ana", "Ben", "Cy", "Dee"]
        .iter()
        .map(|n| engine.create_player(n).unwrap().id)
        .collect();

    engine
        .record_match(NewMatch {
            format: MatchFormat::Singles,
            score_a: 11,
            score_b: 4,
            played_at: Some(t0()),
            source: None,
            participants: vec![
                NewParticipant { player_id: ids[0], team_side: TeamSide::A, winners: 0, errors: 0 },
                NewParticipant { player_id: ids[1], team_side: TeamSide::B, winners: 0, errors: 0 },
            ],
        })
        .unwrap();
    engine
        .record_match(doubles([ids[0], ids[1]], [ids[2], ids[3]], 0, 0, t0() + Duration::hours(1)))
        .unwrap();

    let history = engine.store().match_history().unwrap();
    assert_eq!(history.len(), 2);
    assert!(doubles_samples(&history).is_empty());
    assert!(engine.pair_chemistry().unwrap().is_empty());

    let rows = recompute_chemistry(&history, 1.0, 1.0, t0()).unwrap();
    assert!(rows.is_empty(), "no eligible samples means no rows");
    // The scoreless doubles match still moved ratings.
    assert_ne!(engine.player(ids[2]).unwrap().rating, 1000);
}
