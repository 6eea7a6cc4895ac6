pub(crate) mod schema;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable key-value slots backed by SQLite.
///
/// Each slot holds one serialized document that is read and written
/// wholesale. The connection sits behind a mutex so the database can be
/// shared between the local ledger store and the session store.
pub(crate) struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set database pragmas")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> rusqlite::Result<()> {
        let conn = self.lock();
        let has_version_table: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            conn.execute_batch(schema::SCHEMA_V1)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Slots ─────────────────────────────────────────────────

    pub(crate) fn read_slot(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.lock()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub(crate) fn write_slot(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        write_slot_with(&self.lock(), key, value)
    }

    pub(crate) fn clear_slot(&self, key: &str) -> rusqlite::Result<()> {
        self.lock()
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Read a slot, let `f` compute its replacement, and write it back inside
    /// one SQLite transaction. Returning `Ok(None)` leaves the slot untouched.
    pub(crate) fn update_slot<T, E, F>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(Option<String>) -> Result<(Option<String>, T), E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let (replacement, out) = f(current)?;
        if let Some(value) = replacement {
            write_slot_with(&tx, key, &value)?;
        }
        tx.commit()?;
        Ok(out)
    }
}

fn write_slot_with(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests;
