//! In-memory implementation of `MedicationStore`.
//!
//! Stands in for the surrounding system's persistence. Every write applies
//! the same derived effects the core applies, so a reloaded monitor sees the
//! state it left behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use pulseguard_contracts::{
    dose::DoseEventStatus,
    error::{PulseGuardError, PulseGuardResult},
    medication::{Medication, MedicationId, MedicationPatch, PatientId},
};
use pulseguard_core::traits::MedicationStore;

#[derive(Clone, Default)]
pub struct InMemoryMedicationStore {
    records: Arc<Mutex<HashMap<MedicationId, Medication>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMedicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, id: MedicationId) -> Option<Medication> {
        self.guard().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> PulseGuardResult<MutexGuard<'_, HashMap<MedicationId, Medication>>> {
        self.records.lock().map_err(|_| PulseGuardError::StoreFailed {
            reason: "store lock poisoned".to_string(),
        })
    }

    fn writable(&self) -> PulseGuardResult<MutexGuard<'_, HashMap<MedicationId, Medication>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PulseGuardError::StoreFailed {
                reason: "medication store is read-only".to_string(),
            });
        }
        self.guard()
    }
}

fn not_found(id: MedicationId) -> PulseGuardError {
    PulseGuardError::MedicationNotFound { id: id.to_string() }
}

#[async_trait]
impl MedicationStore for InMemoryMedicationStore {
    async fn list(&self, patient_id: &PatientId) -> PulseGuardResult<Vec<Medication>> {
        let records = self.guard()?;
        Ok(records.values().filter(|m| &m.patient_id == patient_id).cloned().collect())
    }

    async fn create(&self, medication: &Medication) -> PulseGuardResult<()> {
        self.writable()?.insert(medication.id, medication.clone());
        debug!(medication_id = %medication.id, "medication stored");
        Ok(())
    }

    async fn update(&self, id: MedicationId, patch: &MedicationPatch) -> PulseGuardResult<()> {
        let mut records = self.writable()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        patch.apply_to(record);
        Ok(())
    }

    async fn log_dose(
        &self,
        medication_id: MedicationId,
        status: DoseEventStatus,
        time: DateTime<Utc>,
    ) -> PulseGuardResult<()> {
        let mut records = self.writable()?;
        let record = records.get_mut(&medication_id).ok_or_else(|| not_found(medication_id))?;
        record.record_dose(status, time);
        debug!(medication_id = %medication_id, status = %status, "dose stored");
        Ok(())
    }
}
