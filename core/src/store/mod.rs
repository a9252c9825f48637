//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Engines receive plain records and hand back plain outcomes; they never
//! execute SQL directly.

use crate::{
    error::{LadderError, LadderResult},
    event::{EventLogEntry, LadderEvent},
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

mod chemistry;
mod matches;
mod player;

pub struct LadderStore {
    conn: Connection,
}

impl LadderStore {
    pub fn open(path: &str) -> LadderResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LadderResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LadderResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_pair_chemistry.sql"))?;
        Ok(())
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction: the write lock is
    /// taken up front so no other writer can interleave with a recompute.
    /// Any error rolls everything back.
    pub fn write_transaction<T>(
        &self,
        f: impl FnOnce(&LadderStore) -> LadderResult<T>,
    ) -> LadderResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` inside one deferred transaction so every read in it sees the
    /// same snapshot, even while another connection is writing.
    pub fn read_transaction<T>(
        &self,
        f: impl FnOnce(&LadderStore) -> LadderResult<T>,
    ) -> LadderResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &LadderEvent, at: DateTime<Utc>) -> LadderResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (event_type, payload, created_at_ms) VALUES (?1, ?2, ?3)",
            params![event.type_name(), serde_json::to_string(event)?, to_millis(at)],
        )?;
        Ok(())
    }

    pub fn events(&self) -> LadderResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, payload, created_at_ms FROM event_log ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    event_type: row.get(1)?,
                    payload: row.get(2)?,
                    created_at_ms: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> LadderResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> LadderResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| LadderError::Other(anyhow::anyhow!("stored timestamp out of range: {ms}")))
}
