//! Collaborator contracts consumed by the monitoring core.
//!
//! These five traits define the complete external boundary:
//!
//! - `MedicationStore`: persistence for medication records and dose logs
//! - `InteractionLookup`: opaque interaction oracle, queried per drug pair
//! - `DrugInfoService`: monograph text, for display only
//! - `NotificationSink`: best-effort delivery to a user-facing surface
//! - `OverrideWriter`: append-only record of every honoured override
//!
//! Transport is the implementor's concern. Every async call is wrapped in a
//! timeout by the caller; a timeout is a failure, never an empty success.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pulseguard_contracts::{
    acknowledgment::OverrideRecord,
    alert::Notification,
    dose::DoseEventStatus,
    error::PulseGuardResult,
    interaction::RawInteraction,
    medication::{Medication, MedicationId, MedicationPatch, Monograph, PatientId},
};

/// CRUD for medication records and dose logs.
#[async_trait]
pub trait MedicationStore: Send + Sync {
    /// Every medication (active or not) owned by `patient_id`.
    async fn list(&self, patient_id: &PatientId) -> PulseGuardResult<Vec<Medication>>;

    /// Persist a newly admitted medication.
    async fn create(&self, medication: &Medication) -> PulseGuardResult<()>;

    /// Apply a partial update to an existing medication.
    async fn update(&self, id: MedicationId, patch: &MedicationPatch) -> PulseGuardResult<()>;

    /// Record a `taken`, `skipped` or `missed` dose at `time`.
    ///
    /// The store applies the effects of `Medication::record_dose`
    /// atomically. For `missed`, `time` is the scheduled time of the missed
    /// dose, so the next load resumes from the dose after it.
    async fn log_dose(
        &self,
        medication_id: MedicationId,
        status: DoseEventStatus,
        time: DateTime<Utc>,
    ) -> PulseGuardResult<()>;
}

/// The external interaction database, treated as an opaque oracle.
///
/// `Ok(vec![])` means "checked, nothing known". `Err(LookupUnavailable)`
/// means "not checked". Implementations must keep the two distinguishable.
#[async_trait]
pub trait InteractionLookup: Send + Sync {
    /// Known interactions between exactly these two drugs.
    async fn lookup_pair(&self, drug_a: &str, drug_b: &str) -> PulseGuardResult<Vec<RawInteraction>>;

    /// Every known interaction involving `drug_name`.
    async fn lookup_for_name(&self, drug_name: &str) -> PulseGuardResult<Vec<RawInteraction>>;
}

/// Monograph text for display. Never consulted for safety decisions.
#[async_trait]
pub trait DrugInfoService: Send + Sync {
    async fn monograph(&self, drug_name: &str) -> PulseGuardResult<Monograph>;
}

/// A pluggable delivery channel (push, audio, banner, caregiver relay).
///
/// Fire-and-forget: the core never retries and never inspects the outcome.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, notification: &Notification);
}

/// The override ledger: an append-only record of accepted risk.
///
/// A failed write is fatal to the overriding action: an override that
/// cannot be recorded does not proceed.
pub trait OverrideWriter: Send + Sync {
    fn write(&self, record: &OverrideRecord) -> PulseGuardResult<()>;
}
