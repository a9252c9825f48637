//! Store methods for the player roster.

use super::LadderStore;
use crate::{
    error::{LadderError, LadderResult},
    record::Player,
    types::{PlayerId, Rating},
};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

fn player_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        rating: row.get(2)?,
        crowns_collected: row.get::<_, i64>(3)? as u32,
    })
}

impl LadderStore {
    pub fn insert_player(&self, name: &str, rating: Rating) -> LadderResult<Player> {
        self.conn.execute(
            "INSERT INTO player (name, rating, crowns_collected) VALUES (?1, ?2, 0)",
            params![name, rating],
        )?;
        Ok(Player {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            rating,
            crowns_collected: 0,
        })
    }

    pub fn get_player(&self, player_id: PlayerId) -> LadderResult<Player> {
        self.conn
            .query_row(
                "SELECT id, name, rating, crowns_collected FROM player WHERE id = ?1",
                params![player_id],
                player_row_mapper,
            )
            .optional()?
            .ok_or(LadderError::PlayerNotFound { player_id })
    }

    /// The full roster, ordered by id.
    pub fn players(&self) -> LadderResult<Vec<Player>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, rating, crowns_collected FROM player ORDER BY id ASC")?;
        let rows = stmt.query_map([], player_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Overwrite every rating and crown count from a replay. Players absent
    /// from the maps are reset to `base_rating` / zero crowns.
    pub fn write_player_standings(
        &self,
        ratings: &BTreeMap<PlayerId, Rating>,
        crowns: &BTreeMap<PlayerId, u32>,
        base_rating: Rating,
    ) -> LadderResult<()> {
        let mut stmt = self
            .conn
            .prepare("UPDATE player SET rating = ?2, crowns_collected = ?3 WHERE id = ?1")?;
        for player in self.players()? {
            let rating = ratings.get(&player.id).copied().unwrap_or(base_rating);
            let crowns = crowns.get(&player.id).copied().unwrap_or(0);
            stmt.execute(params![player.id, rating, crowns as i64])?;
        }
        Ok(())
    }
}
