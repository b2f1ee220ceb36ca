//! The license record and its binding.

use chrono::{DateTime, Utc};
use onecode_types::{LicenseCode, MachineId};
use serde::{Deserialize, Serialize};

/// Current time truncated to whole milliseconds, the precision every
/// backend persists.
#[must_use]
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// The machine a code is bound to, and when the binding happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub machine_id: MachineId,
    pub activated_at: DateTime<Utc>,
}

/// A license code and its (optional) device binding.
///
/// Machine ID and activation time live together in [`Binding`], so a
/// record can never carry one without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecordView", try_from = "RecordView")]
pub struct LicenseRecord {
    code: LicenseCode,
    created_at: DateTime<Utc>,
    binding: Option<Binding>,
}

impl LicenseRecord {
    /// Creates an unbound record.
    #[must_use]
    pub fn new(code: LicenseCode, created_at: DateTime<Utc>) -> Self {
        Self {
            code,
            created_at,
            binding: None,
        }
    }

    /// Reassembles a record from stored parts.
    #[must_use]
    pub fn from_parts(
        code: LicenseCode,
        created_at: DateTime<Utc>,
        binding: Option<Binding>,
    ) -> Self {
        Self {
            code,
            created_at,
            binding,
        }
    }

    #[must_use]
    pub fn code(&self) -> &LicenseCode {
        &self.code
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// The bound machine, if any.
    #[must_use]
    pub fn machine_id(&self) -> Option<&MachineId> {
        self.binding.as_ref().map(|b| &b.machine_id)
    }

    /// When the current binding was made, if any.
    #[must_use]
    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.binding.as_ref().map(|b| b.activated_at)
    }

    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.binding.is_some()
    }

    /// Sets the binding. Callers must have checked the record is unbound.
    pub(crate) fn bind(&mut self, machine_id: MachineId, activated_at: DateTime<Utc>) {
        self.binding = Some(Binding {
            machine_id,
            activated_at,
        });
    }

    pub(crate) fn unbind(&mut self) {
        self.binding = None;
    }
}

/// Wire form of a record: `{code, machineId, createdAt, activatedAt}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    code: LicenseCode,
    machine_id: Option<MachineId>,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
}

impl From<LicenseRecord> for RecordView {
    fn from(record: LicenseRecord) -> Self {
        let (machine_id, activated_at) = match record.binding {
            Some(b) => (Some(b.machine_id), Some(b.activated_at)),
            None => (None, None),
        };
        Self {
            code: record.code,
            machine_id,
            created_at: record.created_at,
            activated_at,
        }
    }
}

impl TryFrom<RecordView> for LicenseRecord {
    type Error = String;

    fn try_from(view: RecordView) -> Result<Self, Self::Error> {
        let binding = match (view.machine_id, view.activated_at) {
            (Some(machine_id), Some(activated_at)) => Some(Binding {
                machine_id,
                activated_at,
            }),
            (None, None) => None,
            _ => return Err("machineId and activatedAt must be set together".to_string()),
        };
        Ok(Self::from_parts(view.code, view.created_at, binding))
    }
}

/// Aggregate record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LicenseCounts {
    /// All records.
    pub total: u64,
    /// Records with a machine binding.
    pub activated: u64,
}

impl LicenseCounts {
    /// Records without a machine binding.
    #[must_use]
    pub fn unused(&self) -> u64 {
        self.total.saturating_sub(self.activated)
    }
}
