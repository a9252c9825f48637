//! The ladder engine: owns the store, the config and the clock, and wires
//! the three analytics components to persistence.
//!
//! RECOMPUTE ORDER (fixed, documented, never reordered):
//!   1. Write the triggering change (insert / rescore / delete) and its event.
//!   2. Full history replay: participation snapshots, player ratings, crowns.
//!   3. Chemistry recompute: full replace of pair_chemistry.
//!
//! RULES:
//!   - Every write path runs all steps inside one immediate transaction; an
//!     error anywhere rolls the whole recompute back.
//!   - Only step 2 writes ratings, snapshots and crowns.
//!   - Only step 3 (or `recompute_chemistry`) writes pair_chemistry.
//!   - A chemistry fit the solver cannot factor keeps the previous rows on
//!     write paths and is logged as `chemistry_skipped`.
//!   - Read-only queries load roster and history in one deferred
//!     transaction, so they see a single snapshot.

use crate::{
    chemistry::{self, PairChemistry},
    clock::LadderClock,
    config::LadderConfig,
    error::{LadderError, LadderResult},
    event::{EventLogEntry, LadderEvent},
    profile::{build_profile, PlayerProfile},
    rating::{apply_match, ParticipantInput, RatingDeltas},
    record::{MatchRecord, NewMatch, Player},
    replay::{self, elapsed_days, Reign, ReplayOutcome},
    store::LadderStore,
    types::{MatchFormat, MatchId, PlayerId, Rating},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of recording a match: its replayed before/after ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchApplied {
    pub match_id: MatchId,
    pub format: MatchFormat,
    pub score_a: u32,
    pub score_b: u32,
    pub rating_updates: RatingDeltas,
}

/// Who holds the top spot right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KingStatus {
    pub id: PlayerId,
    pub name: String,
    pub rating: Rating,
    pub since: DateTime<Utc>,
    pub days: i64,
    /// The running reign has already reached the crown threshold.
    pub eligible: bool,
    /// "King", or "Queen" for the configured player.
    pub title: String,
    pub crowns_collected: u32,
    pub reigns: Vec<Reign>,
}

pub struct LadderEngine {
    pub config: LadderConfig,
    pub clock: LadderClock,
    store: LadderStore,
}

impl LadderEngine {
    pub fn new(config: LadderConfig, store: LadderStore) -> Self {
        Self { config, clock: LadderClock::System, store }
    }

    /// Load config from `data_dir` and wrap an already-migrated store.
    pub fn build(store: LadderStore, data_dir: &str) -> anyhow::Result<Self> {
        let config = LadderConfig::load(data_dir)?;
        Ok(Self::new(config, store))
    }

    /// In-memory store, default config, clock frozen at `now`.
    pub fn build_test(now: DateTime<Utc>) -> LadderResult<Self> {
        let store = LadderStore::in_memory()?;
        store.migrate()?;
        let mut engine = Self::new(LadderConfig::default_test(), store);
        engine.clock = LadderClock::Fixed(now);
        Ok(engine)
    }

    pub fn store(&self) -> &LadderStore {
        &self.store
    }

    // ── Roster ─────────────────────────────────────────────────

    pub fn create_player(&self, name: &str) -> LadderResult<Player> {
        let player = self.store.insert_player(name, self.config.rating.base_rating)?;
        log::info!("store: created player {} ({})", player.id, player.name);
        Ok(player)
    }

    pub fn players(&self) -> LadderResult<Vec<Player>> {
        self.store.players()
    }

    pub fn player(&self, player_id: PlayerId) -> LadderResult<Player> {
        self.store.get_player(player_id)
    }

    // ── Matches ────────────────────────────────────────────────

    /// The pure Rating Update Model, for callers that only want a preview.
    pub fn apply_single_match(
        &self,
        format: &str,
        score_a: u32,
        score_b: u32,
        participants: &[ParticipantInput],
    ) -> LadderResult<RatingDeltas> {
        let format = MatchFormat::parse(format)?;
        apply_match(format, score_a, score_b, participants, &self.config.rating)
    }

    /// Validate, insert and run the full recompute.
    pub fn record_match(&self, mut new: NewMatch) -> LadderResult<MatchApplied> {
        new.validate()?;
        new.autofill_contributions();
        let now = self.clock.now();
        let played_at = new.played_at.unwrap_or(now);
        let source = new.source.clone().unwrap_or_else(|| "manual".to_string());

        self.store.write_transaction(|store| {
            for p in &new.participants {
                match store.get_player(p.player_id) {
                    Ok(_) => {}
                    Err(LadderError::PlayerNotFound { player_id }) => {
                        return Err(LadderError::UnknownPlayer { player_id, match_id: None });
                    }
                    Err(e) => return Err(e),
                }
            }
            let match_id = store.insert_match(&new, played_at, &source)?;
            let trigger = LadderEvent::MatchRecorded {
                match_id,
                format: new.format,
                score_a: new.score_a,
                score_b: new.score_b,
            };
            let outcome = self.recompute_all(store, &trigger, now)?;
            log::info!("replay: recorded match {match_id} ({} {}-{})", new.format, new.score_a, new.score_b);
            Ok(MatchApplied {
                match_id,
                format: new.format,
                score_a: new.score_a,
                score_b: new.score_b,
                rating_updates: outcome.deltas_for(match_id),
            })
        })
    }

    /// Score edits invalidate everything downstream, so the whole history is
    /// replayed.
    pub fn update_match_score(&self, match_id: MatchId, score_a: u32, score_b: u32) -> LadderResult<ReplayOutcome> {
        let now = self.clock.now();
        self.store.write_transaction(|store| {
            store.update_match_score(match_id, score_a, score_b)?;
            let trigger = LadderEvent::MatchRescored { match_id, score_a, score_b };
            self.recompute_all(store, &trigger, now)
        })
    }

    pub fn delete_match(&self, match_id: MatchId) -> LadderResult<ReplayOutcome> {
        let now = self.clock.now();
        self.store.write_transaction(|store| {
            store.delete_match(match_id)?;
            self.recompute_all(store, &LadderEvent::MatchDeleted { match_id }, now)
        })
    }

    pub fn get_match(&self, match_id: MatchId) -> LadderResult<MatchRecord> {
        self.store.get_match(match_id)
    }

    /// Newest first.
    pub fn list_matches(&self) -> LadderResult<Vec<MatchRecord>> {
        let mut history = self.store.match_history()?;
        history.reverse();
        Ok(history)
    }

    // ── Replay ─────────────────────────────────────────────────

    /// Replay from scratch and persist ratings, snapshots and crowns.
    pub fn replay_full_history(&self) -> LadderResult<ReplayOutcome> {
        let now = self.clock.now();
        self.store.write_transaction(|store| self.persist_replay(store, now))
    }

    /// Read-only replay answering "who is king right now". Nothing is written.
    pub fn current_king(&self) -> LadderResult<Option<KingStatus>> {
        let now = self.clock.now();
        let (roster, history) = self
            .store
            .read_transaction(|store| Ok((store.players()?, store.match_history()?)))?;
        let outcome = replay::replay_full_history(&roster, &history, now, &self.config)?;

        let Some(reign) = outcome.current_reign().cloned() else {
            return Ok(None);
        };
        let Some(king) = roster.iter().find(|p| p.id == reign.king_id) else {
            return Ok(None);
        };
        let days_float = elapsed_days(reign.start, now);
        let title = if self.config.titles.queen_player_id == Some(king.id) {
            "Queen"
        } else {
            "King"
        };

        Ok(Some(KingStatus {
            id: king.id,
            name: king.name.clone(),
            rating: outcome.final_ratings.get(&king.id).copied().unwrap_or(king.rating),
            since: reign.start,
            days: days_float.floor() as i64,
            eligible: days_float >= self.config.reign.crown_threshold_days,
            title: title.to_string(),
            crowns_collected: outcome.crowns.get(&king.id).copied().unwrap_or(0),
            reigns: outcome.reigns,
        }))
    }

    // ── Chemistry ──────────────────────────────────────────────

    /// Full chemistry recompute with explicit ridge strengths. On success the
    /// stored table is replaced; on failure it is left untouched. A negative
    /// or non-finite lambda is `InvalidParameter`; a design the solver cannot
    /// factor is `InsufficientData`.
    pub fn recompute_chemistry(&self, lambda_alpha: f64, lambda_full: f64) -> LadderResult<Vec<PairChemistry>> {
        let now = self.clock.now();
        self.store.write_transaction(|store| {
            let history = store.match_history()?;
            let rows = chemistry::recompute_chemistry(&history, lambda_alpha, lambda_full, now)?;
            self.persist_chemistry(store, &history, &rows, lambda_alpha, lambda_full, now)?;
            Ok(rows)
        })
    }

    /// Stored rows from the last successful recompute.
    pub fn pair_chemistry(&self) -> LadderResult<Vec<PairChemistry>> {
        self.store.pair_chemistry()
    }

    // ── Reporting ──────────────────────────────────────────────

    pub fn player_profile(&self, player_id: PlayerId) -> LadderResult<PlayerProfile> {
        let (player, history) = self
            .store
            .read_transaction(|store| Ok((store.get_player(player_id)?, store.match_history()?)))?;
        Ok(build_profile(player, &history))
    }

    pub fn events(&self) -> LadderResult<Vec<EventLogEntry>> {
        self.store.events()
    }

    // ── Internals ──────────────────────────────────────────────

    fn recompute_all(
        &self,
        store: &LadderStore,
        trigger: &LadderEvent,
        now: DateTime<Utc>,
    ) -> LadderResult<ReplayOutcome> {
        store.append_event(trigger, now)?;
        let outcome = self.persist_replay(store, now)?;

        let history = store.match_history()?;
        let chem = &self.config.chemistry;
        match chemistry::recompute_chemistry(&history, chem.lambda_alpha, chem.lambda_full, now) {
            Ok(rows) => {
                self.persist_chemistry(store, &history, &rows, chem.lambda_alpha, chem.lambda_full, now)?;
            }
            Err(LadderError::InsufficientData { reason }) => {
                log::warn!("chemistry: keeping previous rows: {reason}");
                store.append_event(&LadderEvent::ChemistrySkipped { reason }, now)?;
            }
            Err(e) => return Err(e),
        }
        Ok(outcome)
    }

    fn persist_replay(&self, store: &LadderStore, now: DateTime<Utc>) -> LadderResult<ReplayOutcome> {
        let roster = store.players()?;
        let history = store.match_history()?;
        let outcome = replay::replay_full_history(&roster, &history, now, &self.config)?;

        store.write_participation_snapshots(&outcome.snapshots)?;
        store.write_player_standings(
            &outcome.final_ratings,
            &outcome.crowns,
            self.config.rating.base_rating,
        )?;
        store.append_event(
            &LadderEvent::HistoryReplayed {
                matches: outcome.matches_replayed,
                players: roster.len(),
                reigns: outcome.reigns.len(),
                crowns_awarded: outcome.crowns.values().sum(),
                king_id: outcome.current_reign().map(|r| r.king_id),
            },
            now,
        )?;
        log::info!(
            "replay: {} matches over {} players, king={:?}",
            outcome.matches_replayed,
            roster.len(),
            outcome.current_reign().map(|r| r.king_id)
        );
        Ok(outcome)
    }

    fn persist_chemistry(
        &self,
        store: &LadderStore,
        history: &[MatchRecord],
        rows: &[PairChemistry],
        lambda_alpha: f64,
        lambda_full: f64,
        now: DateTime<Utc>,
    ) -> LadderResult<()> {
        store.replace_pair_chemistry(rows)?;
        store.append_event(
            &LadderEvent::ChemistryRecomputed {
                samples: chemistry::doubles_samples(history).len(),
                pairs: rows.len(),
                lambda_alpha,
                lambda_full,
            },
            now,
        )
    }
}
