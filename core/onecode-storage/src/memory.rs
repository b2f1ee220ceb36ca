//! In-process storage backend.
//!
//! Records live in a `HashMap` behind an `RwLock`. Every mutation takes
//! the write lock for its whole read-check-write sequence, which is what
//! makes `bind_if_unbound` atomic here. Contents vanish with the process.

use crate::{
    BindOutcome, InsertOutcome, LicenseCounts, LicenseRecord, LicenseStore, StorageError,
    StorageResult,
};
use chrono::{DateTime, Utc};
use onecode_types::{LicenseCode, MachineId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Volatile license store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<LicenseCode, LicenseRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<LicenseCode, LicenseRecord>>> {
        self.records.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<LicenseCode, LicenseRecord>>> {
        self.records.write().map_err(|_| StorageError::LockPoisoned)
    }
}

impl LicenseStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn insert_if_absent(
        &self,
        code: &LicenseCode,
        created_at: DateTime<Utc>,
    ) -> StorageResult<InsertOutcome> {
        let mut records = self.write()?;
        if let Some(existing) = records.get(code) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        let record = LicenseRecord::new(code.clone(), created_at);
        records.insert(code.clone(), record.clone());
        Ok(InsertOutcome::Created(record))
    }

    fn bind_if_unbound(
        &self,
        code: &LicenseCode,
        machine_id: &MachineId,
        activated_at: DateTime<Utc>,
    ) -> StorageResult<BindOutcome> {
        let mut records = self.write()?;
        let Some(record) = records.get_mut(code) else {
            return Ok(BindOutcome::Missing);
        };
        if record.is_activated() {
            return Ok(BindOutcome::AlreadyBound(record.clone()));
        }
        record.bind(machine_id.clone(), activated_at);
        Ok(BindOutcome::Bound(record.clone()))
    }

    fn clear_binding(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        let mut records = self.write()?;
        Ok(records.get_mut(code).map(|record| {
            record.unbind();
            record.clone()
        }))
    }

    fn get(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        Ok(self.read()?.get(code).cloned())
    }

    fn scan(&self, offset: usize, limit: usize) -> StorageResult<Vec<LicenseRecord>> {
        let records = self.read()?;
        let mut all: Vec<&LicenseRecord> = records.values().collect();
        all.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.code().cmp(b.code()))
        });
        Ok(all.into_iter().skip(offset).take(limit).cloned().collect())
    }

    fn delete(&self, code: &LicenseCode) -> StorageResult<bool> {
        Ok(self.write()?.remove(code).is_some())
    }

    fn counts(&self) -> StorageResult<LicenseCounts> {
        let records = self.read()?;
        let activated = records.values().filter(|r| r.is_activated()).count();
        Ok(LicenseCounts {
            total: records.len() as u64,
            activated: activated as u64,
        })
    }
}
