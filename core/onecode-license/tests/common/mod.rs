//! Shared test helpers for registry tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use onecode_license::{AdminKey, CodeGenerator, Registry};
use onecode_storage::{
    BindOutcome, InsertOutcome, LicenseCounts, LicenseRecord, LicenseStore, MemoryStore,
    SqliteStore, StorageError, StorageResult,
};
use onecode_types::{LicenseCode, MachineId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const SECRET: &str = "test-generation-secret";
pub const ADMIN: &str = "test-admin-key";

pub fn registry_with(store: Arc<dyn LicenseStore>) -> Registry {
    Registry::new(
        store,
        CodeGenerator::new(SECRET).unwrap(),
        AdminKey::new(ADMIN).unwrap(),
    )
}

pub fn memory_registry() -> Registry {
    registry_with(Arc::new(MemoryStore::new()))
}

pub fn sqlite_registry() -> Registry {
    registry_with(Arc::new(SqliteStore::open_in_memory().unwrap()))
}

/// One registry per backend.
pub fn registries() -> Vec<Registry> {
    vec![memory_registry(), sqlite_registry()]
}

/// A store whose every call fails, as if the database were down.
pub struct DownStore;

fn down<T>() -> StorageResult<T> {
    Err(StorageError::Unavailable("database offline".to_string()))
}

impl LicenseStore for DownStore {
    fn backend(&self) -> &'static str {
        "down"
    }
    fn insert_if_absent(&self, _: &LicenseCode, _: DateTime<Utc>) -> StorageResult<InsertOutcome> {
        down()
    }
    fn bind_if_unbound(
        &self,
        _: &LicenseCode,
        _: &MachineId,
        _: DateTime<Utc>,
    ) -> StorageResult<BindOutcome> {
        down()
    }
    fn clear_binding(&self, _: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        down()
    }
    fn get(&self, _: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        down()
    }
    fn scan(&self, _: usize, _: usize) -> StorageResult<Vec<LicenseRecord>> {
        down()
    }
    fn delete(&self, _: &LicenseCode) -> StorageResult<bool> {
        down()
    }
    fn counts(&self) -> StorageResult<LicenseCounts> {
        down()
    }
}

/// Wraps a memory store and fails every `n`th insert.
pub struct FlakyStore {
    inner: MemoryStore,
    every: u32,
    calls: AtomicU32,
}

impl FlakyStore {
    pub fn failing_every(every: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            every,
            calls: AtomicU32::new(0),
        }
    }
}

impl LicenseStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }
    fn insert_if_absent(
        &self,
        code: &LicenseCode,
        created_at: DateTime<Utc>,
    ) -> StorageResult<InsertOutcome> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n % self.every == 0 {
            return Err(StorageError::Unavailable("rate limited".to_string()));
        }
        self.inner.insert_if_absent(code, created_at)
    }
    fn bind_if_unbound(
        &self,
        code: &LicenseCode,
        machine_id: &MachineId,
        at: DateTime<Utc>,
    ) -> StorageResult<BindOutcome> {
        self.inner.bind_if_unbound(code, machine_id, at)
    }
    fn clear_binding(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        self.inner.clear_binding(code)
    }
    fn get(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>> {
        self.inner.get(code)
    }
    fn scan(&self, offset: usize, limit: usize) -> StorageResult<Vec<LicenseRecord>> {
        self.inner.scan(offset, limit)
    }
    fn delete(&self, code: &LicenseCode) -> StorageResult<bool> {
        self.inner.delete(code)
    }
    fn counts(&self) -> StorageResult<LicenseCounts> {
        self.inner.counts()
    }
}
