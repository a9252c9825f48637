//! Store methods for the pair_chemistry table.

use super::{from_millis, to_millis, LadderStore};
use crate::{chemistry::PairChemistry, error::LadderResult};
use rusqlite::params;

struct ChemistryRow {
    player_id_a: i64,
    player_id_b: i64,
    games_together: i64,
    beta_chemistry: f64,
    beta_t_stat: Option<f64>,
    uplift_a_given_b: f64,
    uplift_b_given_a: f64,
    avg_point_share: f64,
    avg_point_share_base: f64,
    last_updated_ms: i64,
}

impl ChemistryRow {
    fn into_chemistry(self) -> LadderResult<PairChemistry> {
        Ok(PairChemistry {
            player_id_a: self.player_id_a,
            player_id_b: self.player_id_b,
            games_together: self.games_together as u32,
            beta_chemistry: self.beta_chemistry,
            beta_t_stat: self.beta_t_stat,
            uplift_a_given_b: self.uplift_a_given_b,
            uplift_b_given_a: self.uplift_b_given_a,
            avg_point_share: self.avg_point_share,
            avg_point_share_base: self.avg_point_share_base,
            last_updated: from_millis(self.last_updated_ms)?,
        })
    }
}

impl LadderStore {
    /// Delete every row and insert `rows`. Callers run this inside
    /// `write_transaction` so readers never see a half-replaced table.
    pub fn replace_pair_chemistry(&self, rows: &[PairChemistry]) -> LadderResult<()> {
        self.conn.execute("DELETE FROM pair_chemistry", [])?;
        let mut stmt = self.conn.prepare(
            "INSERT INTO pair_chemistry (
                player_id_a, player_id_b, games_together, beta_chemistry, beta_t_stat,
                uplift_a_given_b, uplift_b_given_a, avg_point_share, avg_point_share_base,
                last_updated_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for r in rows {
            stmt.execute(params![
                r.player_id_a,
                r.player_id_b,
                r.games_together as i64,
                r.beta_chemistry,
                r.beta_t_stat,
                r.uplift_a_given_b,
                r.uplift_b_given_a,
                r.avg_point_share,
                r.avg_point_share_base,
                to_millis(r.last_updated),
            ])?;
        }
        Ok(())
    }

    /// Stored rows ordered by pair.
    pub fn pair_chemistry(&self) -> LadderResult<Vec<PairChemistry>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id_a, player_id_b, games_together, beta_chemistry, beta_t_stat,
                    uplift_a_given_b, uplift_b_given_a, avg_point_share, avg_point_share_base,
                    last_updated_ms
             FROM pair_chemistry ORDER BY player_id_a ASC, player_id_b ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ChemistryRow {
                    player_id_a: row.get(0)?,
                    player_id_b: row.get(1)?,
                    games_together: row.get(2)?,
                    beta_chemistry: row.get(3)?,
                    beta_t_stat: row.get(4)?,
                    uplift_a_given_b: row.get(5)?,
                    uplift_b_given_a: row.get(6)?,
                    avg_point_share: row.get(7)?,
                    avg_point_share_base: row.get(8)?,
                    last_updated_ms: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ChemistryRow::into_chemistry).collect()
    }

    pub fn pair_chemistry_count(&self) -> LadderResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pair_chemistry", [], |row| row.get(0))?;
        Ok(count)
    }
}
