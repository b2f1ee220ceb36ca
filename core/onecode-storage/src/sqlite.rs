//! SQLite storage backend.
//!
//! A single connection guarded by a mutex. The bind transition is one
//! conditional `UPDATE ... WHERE machine_id IS NULL`, so the database
//! itself decides the winner of concurrent first activations.

use crate::{
    BindOutcome, Binding, InsertOutcome, LicenseCounts, LicenseRecord, LicenseStore,
    StorageError, StorageResult,
};
use chrono::{DateTime, Utc};
use onecode_types::{LicenseCode, MachineId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS licenses (
        code TEXT PRIMARY KEY,
        machine_id TEXT,
        created_at INTEGER NOT NULL,
        activated_at INTEGER,
        CHECK ((machine_id IS NULL) = (activated_at IS NULL))
    );

    CREATE INDEX IF NOT EXISTS idx_licenses_created
        ON licenses (created_at DESC, code ASC);
";

const SELECT_COLUMNS: &str = "SELECT code, machine_id, created_at, activated_at FROM licenses";

/// Persistent license store backed by SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %mode, "opened license database");
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!(path = %path.display(), "license database ready");
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn select_one(conn: &Connection, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE code = ?1"),
                params![code.as_str()],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }
}

impl LicenseStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn insert_if_absent(
        &self,
        code: &LicenseCode,
        created_at: DateTime<Utc>,
    ) -> StorageResult<InsertOutcome> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO licenses (code, created_at) VALUES (?1, ?2)
             ON CONFLICT(code) DO NOTHING",
            params![code.as_str(), created_at.timestamp_millis()],
        )?;
        if inserted == 1 {
            return Ok(InsertOutcome::Created(LicenseRecord::new(
                code.clone(),
                created_at,
            )));
        }
        match Self::select_one(&conn, code)? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Err(StorageError::Corrupt(format!(
                "insert of {code} was ignored but no row exists"
            ))),
        }
    }

    fn bind_if_unbound(
        &self,
        code: &LicenseCode,
        machine_id: &MachineId,
        activated_at: DateTime<Utc>,
    ) -> StorageResult<BindOutcome> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE licenses SET machine_id = ?1, activated_at = ?2
             WHERE code = ?3 AND machine_id IS NULL",
            params![
                machine_id.as_str(),
                activated_at.timestamp_millis(),
                code.as_str()
            ],
        )?;
        let current = Self::select_one(&conn, code)?;
        Ok(match (updated, current) {
            (_, None) => BindOutcome::Missing,
            (1, Some(record)) => BindOutcome::Bound(record),
            (_, Some(record)) => BindOutcome::AlreadyBound(record),
        })
    }

    fn clear_binding(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE licenses SET machine_id = NULL, activated_at = NULL WHERE code = ?1",
            params![code.as_str()],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        Self::select_one(&conn, code)
    }

    fn get(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        let conn = self.lock()?;
        Self::select_one(&conn, code)
    }

    fn scan(&self, offset: usize, limit: usize) -> StorageResult<Vec<LicenseRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, code ASC LIMIT ?1 OFFSET ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit, offset], RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    fn delete(&self, code: &LicenseCode) -> StorageResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM licenses WHERE code = ?1", params![code.as_str()])?;
        Ok(deleted > 0)
    }

    fn counts(&self) -> StorageResult<LicenseCounts> {
        let conn = self.lock()?;
        let (total, activated): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(machine_id) FROM licenses",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LicenseCounts {
            total: u64::try_from(total).unwrap_or_default(),
            activated: u64::try_from(activated).unwrap_or_default(),
        })
    }

    fn close(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        info!("license database checkpointed");
        Ok(())
    }
}

/// Column values as read, before validation.
struct RawRow {
    code: String,
    machine_id: Option<String>,
    created_at: i64,
    activated_at: Option<i64>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(0)?,
            machine_id: row.get(1)?,
            created_at: row.get(2)?,
            activated_at: row.get(3)?,
        })
    }

    fn into_record(self) -> StorageResult<LicenseRecord> {
        let code = LicenseCode::parse(&self.code)
            .map_err(|e| StorageError::Corrupt(format!("code {:?}: {e}", self.code)))?;
        let created_at = millis_to_datetime(self.created_at)?;
        let binding = match (self.machine_id, self.activated_at) {
            (Some(machine_id), Some(activated_at)) => Some(Binding {
                machine_id: MachineId::parse(&machine_id)
                    .map_err(|e| StorageError::Corrupt(format!("{code}: {e}")))?,
                activated_at: millis_to_datetime(activated_at)?,
            }),
            (None, None) => None,
            _ => {
                return Err(StorageError::Corrupt(format!(
                    "{code}: machine_id and activated_at disagree"
                )));
            }
        };
        Ok(LicenseRecord::from_parts(code, created_at, binding))
    }
}

fn millis_to_datetime(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {millis}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp_now;

    #[test]
    fn schema_rejects_half_bound_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO licenses (code, machine_id, created_at) VALUES ('X', 'HW-1', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn close_on_memory_database_is_harmless() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_if_absent(&LicenseCode::parse("ABC").unwrap(), timestamp_now())
            .unwrap();
        store.close().unwrap();
    }
}
