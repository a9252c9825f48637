//! Rating Update Model: worked examples, zero-sum, multiplier bounds and
//! composition checks.

use ladder_core::{
    config::LadderConfig,
    error::LadderError,
    rating::{apply_match, expected, margin_multiplier, ParticipantInput},
    types::{MatchFormat, TeamSide},
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

fn input(player_id: i64, team_side: TeamSide, winners: u32, errors: u32, rating_before: i64) -> ParticipantInput {
    ParticipantInput { player_id, team_side, winners, errors, rating_before }
}

#[test]
fn singles_worked_example() {
    let cfg = LadderConfig::default_test();
    let out = apply_match(
        MatchFormat::Singles,
        11,
        5,
        &[input(1, TeamSide::A, 0, 0, 1000), input(2, TeamSide::B, 0, 0, 1000)],
        &cfg.rating,
    )
    .unwrap();

    assert_eq!(out[&1].after, 1019, "winner of 11-5 between equals should gain 19");
    assert_eq!(out[&2].after, 981, "loser of 11-5 between equals should lose 19");
}

#[test]
fn expectation_is_complementary() {
    let e = expected(1100.0, 1000.0);
    assert!(e > 0.5);
    assert!((e + expected(1000.0, 1100.0) - 1.0).abs() < 1e-12);
}

#[test]
fn margin_multiplier_stays_in_bounds() {
    let cfg = LadderConfig::default_test();
    assert_eq!(margin_multiplier(0, 0, &cfg.rating), 1.0, "0-0 is a flat game");
    assert_eq!(margin_multiplier(11, 0, &cfg.rating), 2.0, "shutout hits the cap");
    assert!(margin_multiplier(11, 10, &cfg.rating) < margin_multiplier(11, 3, &cfg.rating));

    let mut rng = Pcg64Mcg::seed_from_u64(7);
    for _ in 0..500 {
        let (a, b) = (rng.gen_range(0..=30u32), rng.gen_range(0..=30u32));
        let m = margin_multiplier(a, b, &cfg.rating);
        assert!(
            (cfg.rating.min_margin_multiplier..=cfg.rating.max_margin_multiplier).contains(&m),
            "multiplier {m} out of bounds for {a}-{b}"
        );
    }
}

#[test]
fn singles_deltas_are_zero_sum() {
    let cfg = LadderConfig::default_test();
    let mut rng = Pcg64Mcg::seed_from_u64(42);
    for _ in 0..500 {
        let (sa, sb) = (rng.gen_range(0..=15u32), rng.gen_range(0..=15u32));
        let parts = [
            input(1, TeamSide::A, 0, 0, rng.gen_range(600..1600)),
            input(2, TeamSide::B, 0, 0, rng.gen_range(600..1600)),
        ];
        let out = apply_match(MatchFormat::Singles, sa, sb, &parts, &cfg.rating).unwrap();
        let sum: i64 = out.values().map(|c| c.delta()).sum();
        assert_eq!(sum, 0, "singles {sa}-{sb} not zero-sum: {out:?}");
    }
}

#[test]
fn doubles_deltas_are_zero_sum() {
    let cfg = LadderConfig::default_test();
    let mut rng = Pcg64Mcg::seed_from_u64(1234);
    for _ in 0..500 {
        let (sa, sb) = (rng.gen_range(0..=15u32), rng.gen_range(0..=15u32));
        let mut parts = Vec::new();
        for (id, side) in [(1, TeamSide::A), (2, TeamSide::A), (3, TeamSide::B), (4, TeamSide::B)] {
            parts.push(input(
                id,
                side,
                rng.gen_range(0..8),
                rng.gen_range(0..8),
                rng.gen_range(600..1600),
            ));
        }
        let out = apply_match(MatchFormat::Doubles, sa, sb, &parts, &cfg.rating).unwrap();
        assert_eq!(out.len(), 4);
        let sum: i64 = out.values().map(|c| c.delta()).sum();
        assert_eq!(sum, 0, "doubles {sa}-{sb} not zero-sum: {out:?}");
    }
}

#[test]
fn tie_counts_as_loss_for_side_a() {
    let cfg = LadderConfig::default_test();
    for (sa, sb) in [(5, 5), (0, 0)] {
        let out = apply_match(
            MatchFormat::Singles,
            sa,
            sb,
            &[input(1, TeamSide::A, 0, 0, 1000), input(2, TeamSide::B, 0, 0, 1000)],
            &cfg.rating,
        )
        .unwrap();
        assert_eq!(out[&1].after, 988, "{sa}-{sb} should cost side A half of k");
        assert_eq!(out[&2].after, 1012);
    }
}

#[test]
fn doubles_split_rewards_the_more_productive_winner() {
    let cfg = LadderConfig::default_test();
    let out = apply_match(
        MatchFormat::Doubles,
        11,
        5,
        &[
            input(1, TeamSide::A, 8, 1, 1000),
            input(2, TeamSide::A, 3, 4, 1000),
            input(3, TeamSide::B, 2, 5, 1000),
            input(4, TeamSide::B, 3, 1, 1000),
        ],
        &cfg.rating,
    )
    .unwrap();

    assert_eq!(out[&1].delta() + out[&2].delta(), 12);
    assert!(out[&1].delta() > out[&2].delta(), "more winners should earn more: {out:?}");
    assert!(out[&2].delta() > 0);
    // Losers split by errors: more errors, bigger loss.
    assert!(out[&3].delta() < out[&4].delta(), "more errors should cost more: {out:?}");
    assert_eq!(out[&3].delta() + out[&4].delta(), -12);
}

#[test]
fn doubles_split_when_side_b_wins() {
    let cfg = LadderConfig::default_test();
    let out = apply_match(
        MatchFormat::Doubles,
        5,
        11,
        &[
            input(1, TeamSide::A, 2, 8, 1000),
            input(2, TeamSide::A, 3, 1, 1000),
            input(3, TeamSide::B, 8, 2, 1000),
            input(4, TeamSide::B, 1, 3, 1000),
        ],
        &cfg.rating,
    )
    .unwrap();

    // Losing side A splits by errors, winning side B by winners.
    let deltas: Vec<(i64, i64)> = out.iter().map(|(&id, c)| (id, c.delta())).collect();
    assert_eq!(deltas, vec![(1, -10), (2, -2), (3, 10), (4, 2)]);
}

#[test]
fn wrong_side_counts_are_rejected() {
    let cfg = LadderConfig::default_test();
    let err = apply_match(
        MatchFormat::Singles,
        11,
        5,
        &[
            input(1, TeamSide::A, 0, 0, 1000),
            input(2, TeamSide::A, 0, 0, 1000),
            input(3, TeamSide::B, 0, 0, 1000),
        ],
        &cfg.rating,
    )
    .unwrap_err();
    assert!(matches!(err, LadderError::InvalidMatchComposition { .. }), "got {err:?}");

    let err = apply_match(
        MatchFormat::Doubles,
        11,
        5,
        &[input(1, TeamSide::A, 0, 0, 1000), input(2, TeamSide::B, 0, 0, 1000)],
        &cfg.rating,
    )
    .unwrap_err();
    assert!(matches!(err, LadderError::InvalidMatchComposition { .. }), "got {err:?}");
}

#[test]
fn duplicate_player_is_rejected() {
    let cfg = LadderConfig::default_test();
    let err = apply_match(
        MatchFormat::Doubles,
        11,
        5,
        &[
            input(1, TeamSide::A, 0, 0, 1000),
            input(1, TeamSide::A, 0, 0, 1000),
            input(3, TeamSide::B, 0, 0, 1000),
            input(4, TeamSide::B, 0, 0, 1000),
        ],
        &cfg.rating,
    )
    .unwrap_err();
    assert!(matches!(err, LadderError::InvalidMatchComposition { .. }), "got {err:?}");
}

#[test]
fn format_parses_case_insensitively() {
    assert_eq!(MatchFormat::parse("Doubles").unwrap(), MatchFormat::Doubles);
    assert_eq!(MatchFormat::parse("singles").unwrap(), MatchFormat::Singles);
    assert!(MatchFormat::parse("triples").is_err());
}
