//! History Replay Engine: determinism, reign thresholds, tie-breaks and
//! crown idempotence.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ladder_core::{
    config::LadderConfig,
    engine::LadderEngine,
    error::LadderError,
    record::{MatchRecord, NewMatch, NewParticipant, Participation, Player},
    replay::{replay_full_history, top_player},
    types::{MatchFormat, TeamSide},
};
use std::collections::BTreeMap;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn roster(ids: &[i64]) -> Vec<Player> {
    ids.iter()
        .map(|&id| Player { id, name: format!("p{id}"), rating: 1000, crowns_collected: 0 })
        .collect()
}

fn side(player_id: i64, team_side: TeamSide) -> Participation {
    Participation { player_id, team_side, winners: 0, errors: 0, rating_before: None, rating_after: None }
}

fn singles(id: i64, a: i64, b: i64, score_a: u32, score_b: u32, played_at: DateTime<Utc>) -> MatchRecord {
    MatchRecord {
        id,
        format: MatchFormat::Singles,
        score_a,
        score_b,
        played_at,
        source: "manual".into(),
        participants: vec![side(a, TeamSide::A), side(b, TeamSide::B)],
    }
}

#[test]
fn replay_is_deterministic() {
    let cfg = LadderConfig::default_test();
    let players = roster(&[1, 2, 3]);
    let history = vec![
        singles(1, 1, 2, 11, 5, t0()),
        singles(2, 2, 3, 11, 9, t0() + Duration::days(2)),
        singles(3, 3, 1, 11, 2, t0() + Duration::days(20)),
    ];
    let now = t0() + Duration::days(40);

    let first = replay_full_history(&players, &history, now, &cfg).unwrap();
    let second = replay_full_history(&players, &history, now, &cfg).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap(),
        "two replays of the same history must agree exactly"
    );
    assert_eq!(first.matches_replayed, 3);
    assert_eq!(first.snapshots.len(), 6);
    assert_eq!(first.final_ratings.values().sum::<i64>(), 3000, "ratings are conserved");
}

#[test]
fn replay_orders_by_played_at_then_id() {
    let cfg = LadderConfig::default_test();
    let players = roster(&[1, 2]);
    let later = singles(1, 1, 2, 11, 0, t0() + Duration::days(1));
    let earlier = singles(2, 2, 1, 11, 0, t0());
    let outcome = replay_full_history(&players, &[later, earlier], t0() + Duration::days(2), &cfg).unwrap();

    assert_eq!(outcome.snapshots[0].match_id, 2, "earlier match must replay first");
    assert_eq!(outcome.reigns[0].king_id, 2);
}

#[test]
fn same_timestamp_falls_back_to_match_id() {
    let cfg = LadderConfig::default_test();
    let players = roster(&[1, 2]);
    let now = t0() + Duration::days(3);
    // Stored out of id order; both played at the same instant.
    let takeover = singles(5, 2, 1, 11, 0, t0());
    let opener = singles(3, 1, 2, 11, 5, t0());
    let outcome = replay_full_history(&players, &[takeover, opener], now, &cfg).unwrap();

    let order: Vec<i64> = outcome.snapshots.iter().map(|s| s.match_id).collect();
    assert_eq!(order, vec![3, 3, 5, 5], "lower id replays first on a shared timestamp");

    assert_eq!(outcome.reigns.len(), 2);
    let first = &outcome.reigns[0];
    assert_eq!((first.king_id, first.start, first.end), (1, t0(), t0()));
    assert!(!first.open && !first.earned_crown);
    let current = outcome.current_reign().expect("open reign");
    assert_eq!((current.king_id, current.start, current.end), (2, t0(), now));
    assert_eq!(outcome.final_ratings[&2], 1008);
}

#[test]
fn crown_threshold_is_inclusive_in_fractional_days() {
    let cfg = LadderConfig::default_test();
    let players = roster(&[1, 2]);
    let just_short = t0() + Duration::milliseconds((13.999 * 86_400_000.0) as i64);
    let exactly = t0() + Duration::days(14);

    for (takeover_at, expect_crown) in [(just_short, false), (exactly, true)] {
        let history = vec![
            singles(1, 1, 2, 11, 5, t0()),
            // Shutout flips the lead back to player 2.
            singles(2, 2, 1, 11, 0, takeover_at),
        ];
        let outcome = replay_full_history(&players, &history, takeover_at, &cfg).unwrap();

        assert_eq!(outcome.reigns.len(), 2, "one closed reign plus the open one");
        let closed = &outcome.reigns[0];
        assert_eq!(closed.king_id, 1);
        assert!(!closed.open);
        assert_eq!(closed.earned_crown, expect_crown, "reign ending at {takeover_at}");
        assert_eq!(closed.days, if expect_crown { 14 } else { 13 });
        assert_eq!(outcome.crowns[&1], u32::from(expect_crown));
        assert_eq!(outcome.current_reign().map(|r| r.king_id), Some(2));
    }
}

#[test]
fn open_reign_never_counts_as_a_crown() {
    let cfg = LadderConfig::default_test();
    let players = roster(&[1, 2]);
    let history = vec![singles(1, 1, 2, 11, 5, t0())];
    let outcome = replay_full_history(&players, &history, t0() + Duration::days(60), &cfg).unwrap();

    let open = outcome.current_reign().expect("open reign");
    assert!(open.earned_crown, "open reign reports eligibility");
    assert_eq!(open.days, 60);
    assert_eq!(outcome.crowns[&1], 0, "open reign must not be counted");
    assert_eq!(outcome.crowns[&2], 0);
}

#[test]
fn top_player_ties_resolve_to_lowest_id() {
    let ratings: BTreeMap<i64, i64> = [(3, 1010), (2, 1010), (1, 990)].into_iter().collect();
    assert_eq!(top_player(&ratings), Some(2));

    let level: BTreeMap<i64, i64> = [(5, 1000), (4, 1000)].into_iter().collect();
    assert_eq!(top_player(&level), Some(4));
    assert_eq!(top_player(&BTreeMap::new()), None);
}

#[test]
fn empty_history_has_no_king() {
    let cfg = LadderConfig::default_test();
    let outcome = replay_full_history(&roster(&[1, 2]), &[], t0(), &cfg).unwrap();
    assert!(outcome.reigns.is_empty());
    assert!(outcome.current_reign().is_none());
    assert_eq!(outcome.final_ratings[&1], 1000);
}

#[test]
fn unknown_participant_fails_the_replay() {
    let cfg = LadderConfig::default_test();
    let history = vec![singles(7, 1, 99, 11, 5, t0())];
    let err = replay_full_history(&roster(&[1, 2]), &history, t0(), &cfg).unwrap_err();
    assert!(
        matches!(err, LadderError::UnknownPlayer { player_id: 99, match_id: Some(7) }),
        "got {err:?}"
    );
}

#[test]
fn persisted_crowns_are_overwritten_not_accumulated() {
    let now = t0() + Duration::days(40);
    let engine = LadderEngine::build_test(now).unwrap();
    let a = engine.create_player("Ana").unwrap();
    let b = engine.create_player("Ben").unwrap();

    for (winner, loser, at) in [(a.id, b.id, t0()), (b.id, a.id, t0() + Duration::days(20))] {
        engine
            .record_match(NewMatch {
                format: MatchFormat::Singles,
                score_a: 11,
                score_b: 0,
                played_at: Some(at),
                source: None,
                participants: vec![
                    NewParticipant { player_id: winner, team_side: TeamSide::A, winners: 0, errors: 0 },
                    NewParticipant { player_id: loser, team_side: TeamSide::B, winners: 0, errors: 0 },
                ],
            })
            .unwrap();
    }

    for _ in 0..3 {
        engine.replay_full_history().unwrap();
    }
    let ana = engine.player(a.id).unwrap();
    let ben = engine.player(b.id).unwrap();
    assert_eq!(ana.crowns_collected, 1, "one 20-day reign, replayed three times");
    assert_eq!(ben.crowns_collected, 0, "the open reign is not a crown");
}
