//! Storage layer for the onecode license registry.
//!
//! Every backend implements [`LicenseStore`], a small set of primitives
//! the registry composes into its operations:
//!
//! - insert-if-absent (code generation never overwrites a record)
//! - bind-if-unbound (a single conditional update, so concurrent binds
//!   on one code resolve to exactly one winner)
//! - clear binding, read, paginated scan, delete, aggregate counts
//!
//! Two backends ship with the crate: [`MemoryStore`] for tests and
//! throwaway deployments, and [`SqliteStore`] for persistent ones.

mod error;
mod memory;
mod record;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use record::{timestamp_now, Binding, LicenseCounts, LicenseRecord};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use onecode_types::{LicenseCode, MachineId};

/// Result of [`LicenseStore::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new unbound record was written.
    Created(LicenseRecord),
    /// A record with this code already existed and was left untouched.
    Existing(LicenseRecord),
}

impl InsertOutcome {
    /// Returns the stored record, new or existing.
    #[must_use]
    pub fn record(&self) -> &LicenseRecord {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }

    /// Returns true if this call created the record.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Result of [`LicenseStore::bind_if_unbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The record was unbound and is now bound by this call.
    Bound(LicenseRecord),
    /// The record was already bound (to this or another machine) and
    /// was not modified.
    AlreadyBound(LicenseRecord),
    /// No record exists for the code.
    Missing,
}

/// Storage interface for license records.
///
/// Implementations must make [`bind_if_unbound`](Self::bind_if_unbound)
/// atomic with respect to every other mutation of the same code.
pub trait LicenseStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Creates an unbound record unless one with this code exists.
    fn insert_if_absent(
        &self,
        code: &LicenseCode,
        created_at: DateTime<Utc>,
    ) -> StorageResult<InsertOutcome>;

    /// Binds `machine_id` to the code if and only if it is currently unbound.
    fn bind_if_unbound(
        &self,
        code: &LicenseCode,
        machine_id: &MachineId,
        activated_at: DateTime<Utc>,
    ) -> StorageResult<BindOutcome>;

    /// Clears any binding. Returns the updated record, or `None` if the
    /// code does not exist.
    fn clear_binding(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>>;

    /// Reads a single record.
    fn get(&self, code: &LicenseCode) -> StorageResult<Option<LicenseRecord>>;

    /// Returns up to `limit` records starting at `offset`, newest first,
    /// ties broken by ascending code.
    fn scan(&self, offset: usize, limit: usize) -> StorageResult<Vec<LicenseRecord>>;

    /// Deletes a record. Returns false if it did not exist.
    fn delete(&self, code: &LicenseCode) -> StorageResult<bool>;

    /// Counts all records and the bound subset.
    fn counts(&self) -> StorageResult<LicenseCounts>;

    /// Flushes and releases backend resources at shutdown.
    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
