//! Store methods for match history and participations.

use super::{from_millis, to_millis, LadderStore};
use crate::{
    error::{LadderError, LadderResult},
    record::{MatchRecord, NewMatch, Participation},
    replay::ParticipationSnapshot,
    types::{MatchFormat, MatchId, TeamSide},
};
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::collections::BTreeMap;

struct MatchRow {
    id: MatchId,
    format: String,
    score_a: i64,
    score_b: i64,
    played_at_ms: i64,
    source: String,
}

struct ParticipationRow {
    match_id: MatchId,
    player_id: i64,
    team_side: String,
    winners: i64,
    errors: i64,
    rating_before: Option<i64>,
    rating_after: Option<i64>,
}

impl ParticipationRow {
    fn into_participation(self) -> LadderResult<Participation> {
        Ok(Participation {
            player_id: self.player_id,
            team_side: TeamSide::parse(&self.team_side)?,
            winners: self.winners as u32,
            errors: self.errors as u32,
            rating_before: self.rating_before,
            rating_after: self.rating_after,
        })
    }
}

const MATCH_COLUMNS: &str = "id, format, score_a, score_b, played_at_ms, source";

fn match_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        format: row.get(1)?,
        score_a: row.get(2)?,
        score_b: row.get(3)?,
        played_at_ms: row.get(4)?,
        source: row.get(5)?,
    })
}

fn participation_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParticipationRow> {
    Ok(ParticipationRow {
        match_id: row.get(0)?,
        player_id: row.get(1)?,
        team_side: row.get(2)?,
        winners: row.get(3)?,
        errors: row.get(4)?,
        rating_before: row.get(5)?,
        rating_after: row.get(6)?,
    })
}

impl LadderStore {
    /// Insert a validated match and its participations. Ratings stay NULL
    /// until the replay in the same transaction fills them in.
    pub fn insert_match(
        &self,
        new: &NewMatch,
        played_at: DateTime<Utc>,
        source: &str,
    ) -> LadderResult<MatchId> {
        self.conn.execute(
            "INSERT INTO match_record (format, score_a, score_b, played_at_ms, source)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.format.as_str(),
                new.score_a as i64,
                new.score_b as i64,
                to_millis(played_at),
                source,
            ],
        )?;
        let match_id = self.conn.last_insert_rowid();

        let mut stmt = self.conn.prepare(
            "INSERT INTO match_participation (match_id, player_id, team_side, winners, errors)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for p in &new.participants {
            stmt.execute(params![
                match_id,
                p.player_id,
                p.team_side.as_str(),
                p.winners as i64,
                p.errors as i64,
            ])?;
        }
        Ok(match_id)
    }

    /// Every match with its participations, ordered by (played_at, id).
    pub fn match_history(&self) -> LadderResult<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM match_record ORDER BY played_at_ms ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map([], match_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT match_id, player_id, team_side, winners, errors, rating_before, rating_after
             FROM match_participation ORDER BY match_id ASC, rowid ASC",
        )?;
        let mut by_match: BTreeMap<MatchId, Vec<Participation>> = BTreeMap::new();
        for raw in stmt.query_map([], participation_row_mapper)? {
            let raw = raw?;
            by_match
                .entry(raw.match_id)
                .or_default()
                .push(raw.into_participation()?);
        }

        rows.into_iter()
            .map(|row| {
                let participants = by_match.remove(&row.id).unwrap_or_default();
                assemble(row, participants)
            })
            .collect()
    }

    pub fn get_match(&self, match_id: MatchId) -> LadderResult<MatchRecord> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {MATCH_COLUMNS} FROM match_record WHERE id = ?1"),
                params![match_id],
                match_row_mapper,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => LadderError::MatchNotFound { match_id },
                other => other.into(),
            })?;

        let mut stmt = self.conn.prepare(
            "SELECT match_id, player_id, team_side, winners, errors, rating_before, rating_after
             FROM match_participation WHERE match_id = ?1 ORDER BY rowid ASC",
        )?;
        let participants = stmt
            .query_map(params![match_id], participation_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(ParticipationRow::into_participation)
            .collect::<LadderResult<Vec<_>>>()?;
        assemble(row, participants)
    }

    pub fn update_match_score(&self, match_id: MatchId, score_a: u32, score_b: u32) -> LadderResult<()> {
        let changed = self.conn.execute(
            "UPDATE match_record SET score_a = ?2, score_b = ?3 WHERE id = ?1",
            params![match_id, score_a as i64, score_b as i64],
        )?;
        if changed == 0 {
            return Err(LadderError::MatchNotFound { match_id });
        }
        Ok(())
    }

    /// Participations go with the match (ON DELETE CASCADE).
    pub fn delete_match(&self, match_id: MatchId) -> LadderResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM match_record WHERE id = ?1", params![match_id])?;
        if changed == 0 {
            return Err(LadderError::MatchNotFound { match_id });
        }
        Ok(())
    }

    pub fn write_participation_snapshots(&self, snapshots: &[ParticipationSnapshot]) -> LadderResult<()> {
        let mut stmt = self.conn.prepare(
            "UPDATE match_participation SET rating_before = ?3, rating_after = ?4
             WHERE match_id = ?1 AND player_id = ?2",
        )?;
        for s in snapshots {
            stmt.execute(params![s.match_id, s.player_id, s.rating_before, s.rating_after])?;
        }
        Ok(())
    }

    pub fn match_count(&self) -> LadderResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM match_record", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn assemble(row: MatchRow, participants: Vec<Participation>) -> LadderResult<MatchRecord> {
    Ok(MatchRecord {
        id: row.id,
        format: MatchFormat::parse(&row.format)?,
        score_a: row.score_a as u32,
        score_b: row.score_b as u32,
        played_at: from_millis(row.played_at_ms)?,
        source: row.source,
        participants,
    })
}
