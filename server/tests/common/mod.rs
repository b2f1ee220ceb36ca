//! Shared helpers for the HTTP tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use onecode_license::{AdminKey, CodeGenerator, Registry};
use onecode_server::build_router;
use onecode_storage::{
    BindOutcome, InsertOutcome, LicenseCounts, LicenseRecord, LicenseStore, MemoryStore,
    SqliteStore, StorageError, StorageResult,
};
use onecode_types::{LicenseCode, MachineId};
use std::sync::Arc;

pub const SECRET: &str = "api-test-secret";
pub const ADMIN: &str = "api-test-admin";

pub fn registry_with(store: Arc<dyn LicenseStore>) -> Arc<Registry> {
    Arc::new(Registry::new(
        store,
        CodeGenerator::new(SECRET).unwrap(),
        AdminKey::new(ADMIN).unwrap(),
    ))
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
pub async fn spawn_with(registry: Arc<Registry>) -> String {
    let app = build_router(registry);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

pub async fn spawn_test_server() -> String {
    spawn_with(registry_with(Arc::new(MemoryStore::new()))).await
}

pub async fn spawn_sqlite_server() -> String {
    spawn_with(registry_with(Arc::new(SqliteStore::open_in_memory().unwrap()))).await
}

/// A store whose every call fails.
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
