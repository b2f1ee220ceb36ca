//! The license registry: issuance, binding, and admin operations.
//!
//! The registry owns no state of its own beyond the injected store, the
//! code generator and the admin credential. Every operation is a short
//! sequence of storage primitives and is safe to run concurrently.

use crate::admin::AdminKey;
use crate::error::{LicenseError, LicenseResult};
use crate::generator::CodeGenerator;
use onecode_storage::{
    timestamp_now, BindOutcome, InsertOutcome, LicenseCounts, LicenseRecord, LicenseStore,
};
use onecode_types::{LicenseCode, MachineId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest batch accepted by [`Registry::generate_batch`].
pub const MAX_BATCH: u32 = 100;

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest page size served by [`Registry::list`].
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Result of single-seed issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub seed: String,
    pub code: LicenseCode,
    /// True if this call created the record; false if it already existed
    /// or persistence failed.
    pub created: bool,
    /// Set when the code could not be persisted. The code itself is still
    /// valid output because it depends only on the seed and secret.
    pub warning: Option<String>,
}

/// Result of batch issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchIssued {
    /// Codes that are present in the store.
    pub codes: Vec<LicenseCode>,
    /// Upserts that failed and produced no stored code.
    pub failed: u32,
}

/// Outcome of a verify call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The code was unbound and is now bound to the caller.
    Activated(LicenseRecord),
    /// The code was already bound to the caller.
    SameDevice(LicenseRecord),
    /// The code is bound to a different machine.
    BoundElsewhere,
    /// No such code.
    NotFound,
}

impl Verification {
    /// True if the caller may use the license.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Activated(_) | Self::SameDevice(_))
    }

    /// True if the code is bound to some machine.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    /// Refusal reason for invalid outcomes.
    #[must_use]
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::BoundElsewhere => Some("bound to another device"),
            Self::NotFound => Some("code not found"),
            _ => None,
        }
    }

    /// Human-readable note for valid outcomes.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Activated(_) => Some("first activation"),
            Self::SameDevice(_) => Some("same device"),
            _ => None,
        }
    }
}

/// One page of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<LicenseRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// The license registry.
pub struct Registry {
    store: Arc<dyn LicenseStore>,
    generator: CodeGenerator,
    admin_key: AdminKey,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("backend", &self.store.backend())
            .finish_non_exhaustive()
    }
}

impl Registry {
    #[must_use]
    pub fn new(store: Arc<dyn LicenseStore>, generator: CodeGenerator, admin_key: AdminKey) -> Self {
        Self {
            store,
            generator,
            admin_key,
        }
    }

    /// The storage backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LicenseStore> {
        &self.store
    }

    /// Checks the admin credential without running an operation.
    pub fn authorize(&self, admin_key: Option<&str>) -> LicenseResult<()> {
        self.admin_key.authorize(admin_key)
    }

    /// Issues the code for `seed`, creating its record if absent.
    ///
    /// Storage failures do not fail the call: the deterministic code is
    /// returned with a warning attached.
    pub fn generate(&self, seed: &str) -> LicenseResult<Issued> {
        let code = self.generator.generate(seed)?;

        match self.store.insert_if_absent(&code, timestamp_now()) {
            Ok(outcome) => {
                let created = outcome.is_created();
                if created {
                    info!(code = %code, "issued license code");
                } else {
                    debug!(code = %code, "code already issued, reusing record");
                }
                Ok(Issued {
                    seed: seed.to_string(),
                    code,
                    created,
                    warning: None,
                })
            }
            Err(e) => {
                warn!(code = %code, error = %e, "failed to persist issued code");
                Ok(Issued {
                    seed: seed.to_string(),
                    code,
                    created: false,
                    warning: Some(format!("code was not persisted: {e}")),
                })
            }
        }
    }

    /// Issues `count` codes from synthesized seeds (admin).
    ///
    /// Each upsert is independent; failures are counted, not fatal.
    pub fn generate_batch(&self, admin_key: Option<&str>, count: u32) -> LicenseResult<BatchIssued> {
        self.admin_key.authorize(admin_key)?;
        if !(1..=MAX_BATCH).contains(&count) {
            return Err(LicenseError::Validation(format!(
                "count must be between 1 and {MAX_BATCH}"
            )));
        }

        let mut issued = BatchIssued::default();
        for index in 0..count {
            let code = self.generator.generate(&CodeGenerator::batch_seed(index))?;
            match self.store.insert_if_absent(&code, timestamp_now()) {
                Ok(InsertOutcome::Created(_)) => issued.codes.push(code),
                Ok(InsertOutcome::Existing(_)) => {
                    warn!(code = %code, "batch seed collided with an existing code");
                    issued.codes.push(code);
                }
                Err(e) => {
                    warn!(code = %code, error = %e, "failed to persist batch code");
                    issued.failed += 1;
                }
            }
        }

        info!(
            requested = count,
            stored = issued.codes.len(),
            failed = issued.failed,
            "batch issuance finished"
        );
        Ok(issued)
    }

    /// Verifies `code` for `machine_id`, binding it on first use.
    pub fn verify(&self, code: &str, machine_id: &str) -> LicenseResult<Verification> {
        let code = LicenseCode::parse(code)?;
        let machine_id = MachineId::parse(machine_id)?;

        let outcome = match self
            .store
            .bind_if_unbound(&code, &machine_id, timestamp_now())?
        {
            BindOutcome::Bound(record) => {
                info!(code = %code, machine_id = %machine_id, "license activated");
                Verification::Activated(record)
            }
            BindOutcome::AlreadyBound(record) if record.machine_id() == Some(&machine_id) => {
                debug!(code = %code, "license re-verified on bound device");
                Verification::SameDevice(record)
            }
            BindOutcome::AlreadyBound(_) => {
                warn!(code = %code, machine_id = %machine_id, "license bound to another device");
                Verification::BoundElsewhere
            }
            BindOutcome::Missing => {
                debug!(code = %code, "verify for unknown code");
                Verification::NotFound
            }
        };
        Ok(outcome)
    }

    /// Clears the binding of `code` (admin). Idempotent for unbound codes.
    pub fn unbind(&self, admin_key: Option<&str>, code: &str) -> LicenseResult<LicenseRecord> {
        self.admin_key.authorize(admin_key)?;
        let code = LicenseCode::parse(code)?;

        match self.store.clear_binding(&code)? {
            Some(record) => {
                info!(code = %code, "license unbound");
                Ok(record)
            }
            None => Err(LicenseError::NotFound(code)),
        }
    }

    /// Returns one page of records, newest first (admin).
    pub fn list(&self, admin_key: Option<&str>, page: u32, limit: u32) -> LicenseResult<Page> {
        self.admin_key.authorize(admin_key)?;
        if page == 0 {
            return Err(LicenseError::Validation("page must be at least 1".to_string()));
        }
        if limit == 0 {
            return Err(LicenseError::Validation("limit must be at least 1".to_string()));
        }
        let limit = limit.min(MAX_PAGE_LIMIT);

        let offset = (u64::from(page) - 1) * u64::from(limit);
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let records = self.store.scan(offset, limit as usize)?;
        let total = self.store.counts()?.total;

        Ok(Page {
            records,
            page,
            limit,
            total,
            pages: total.div_ceil(u64::from(limit)),
        })
    }

    /// Looks up a single record (admin). Absent codes are `Ok(None)`.
    pub fn check(&self, admin_key: Option<&str>, code: &str) -> LicenseResult<Option<LicenseRecord>> {
        self.admin_key.authorize(admin_key)?;
        let code = LicenseCode::parse(code)?;
        Ok(self.store.get(&code)?)
    }

    /// Deletes a record (admin). Returns false if it did not exist.
    pub fn delete(&self, admin_key: Option<&str>, code: &str) -> LicenseResult<bool> {
        self.admin_key.authorize(admin_key)?;
        let code = LicenseCode::parse(code)?;

        let deleted = self.store.delete(&code)?;
        if deleted {
            info!(code = %code, "license deleted");
        }
        Ok(deleted)
    }

    /// Aggregate counts.
    pub fn stats(&self) -> LicenseResult<LicenseCounts> {
        Ok(self.store.counts()?)
    }

    /// Releases the store at shutdown.
    pub fn close(&self) -> LicenseResult<()> {
        Ok(self.store.close()?)
    }
}
