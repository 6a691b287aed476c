//! Simulated drug data for the PulseGuard reference runtime.
//!
//! All data in this module is hardcoded and fictional. No external systems are
//! contacted. The mock services stand in for a real interaction database and
//! a drug monograph API, and can be told to fail or stall so the degraded
//! paths can be demonstrated.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use pulseguard_contracts::{
    error::{PulseGuardError, PulseGuardResult},
    interaction::{normalize_name, PairKey, RawInteraction},
    medication::{MedicationForm, Monograph, NewMedication, PatientId},
};
use pulseguard_core::traits::{DrugInfoService, InteractionLookup};

/// The `source` reported by the mock interaction database.
pub const MOCK_SOURCE: &str = "mock-interaction-db";

/// How long a stalled lookup sleeps. Far beyond any configured timeout.
const STALL: Duration = Duration::from_secs(60);

// ── Interaction table (mock) ─────────────────────────────────────────────────

/// Known pairs (order-independent):
/// - warfarin + aspirin         → HIGH
/// - warfarin + ibuprofen       → HIGH
/// - metformin + contrast-dye   → HIGH
/// - lisinopril + potassium     → MEDIUM
/// - amoxicillin + ibuprofen    → LOW
pub fn interaction_table() -> Vec<RawInteraction> {
    let row = |a: &str, b: &str, label: &str, description: &str| RawInteraction {
        drug_a: a.to_string(),
        drug_b: b.to_string(),
        severity_label: label.to_string(),
        description: description.to_string(),
        source: MOCK_SOURCE.to_string(),
    };
    vec![
        row(
            "warfarin",
            "aspirin",
            "HIGH",
            "Both agents inhibit platelet function and increase bleeding risk via distinct pathways",
        ),
        row(
            "warfarin",
            "ibuprofen",
            "HIGH",
            "NSAIDs displace warfarin from plasma proteins and impair platelet aggregation",
        ),
        row(
            "metformin",
            "contrast-dye",
            "HIGH",
            "Iodinated contrast may cause acute kidney injury, impairing metformin clearance and risking lactic acidosis",
        ),
        row(
            "lisinopril",
            "potassium",
            "MEDIUM",
            "ACE inhibitors reduce aldosterone secretion, decreasing potassium excretion and risking hyperkalemia",
        ),
        row(
            "amoxicillin",
            "ibuprofen",
            "LOW",
            "NSAIDs may slightly reduce the renal clearance of amoxicillin at high doses",
        ),
    ]
}

// ── Interaction lookup service (mock) ────────────────────────────────────────

/// Answers from [`interaction_table`].
///
/// A full outage, or individual failing and stalling pairs, can be switched
/// on at runtime. Every pair query is counted.
#[derive(Default)]
pub struct MockInteractionLookup {
    outage: AtomicBool,
    failing: Mutex<HashSet<PairKey>>,
    stalled: Mutex<HashSet<PairKey>>,
    queries: AtomicUsize,
}

impl MockInteractionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail until [`restore`](Self::restore).
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    pub fn fail_pair(&self, a: &str, b: &str) {
        lock(&self.failing).insert(PairKey::new(a, b));
    }

    /// Answers for this pair never arrive in time.
    pub fn stall_pair(&self, a: &str, b: &str) {
        lock(&self.stalled).insert(PairKey::new(a, b));
    }

    /// Clear the outage and every failing or stalled pair.
    pub fn restore(&self) {
        self.set_outage(false);
        lock(&self.failing).clear();
        lock(&self.stalled).clear();
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn unavailable(subject: &str) -> PulseGuardError {
        PulseGuardError::LookupUnavailable {
            service: "interaction".to_string(),
            subject: subject.to_string(),
            reason: "503 Service Unavailable".to_string(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl InteractionLookup for MockInteractionLookup {
    async fn lookup_pair(&self, drug_a: &str, drug_b: &str) -> PulseGuardResult<Vec<RawInteraction>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let key = PairKey::new(drug_a, drug_b);
        debug!(pair = %key, "mock interaction lookup");

        if self.outage.load(Ordering::SeqCst) || lock(&self.failing).contains(&key) {
            return Err(Self::unavailable(&key.to_string()));
        }
        if lock(&self.stalled).contains(&key) {
            tokio::time::sleep(STALL).await;
        }
        Ok(interaction_table()
            .into_iter()
            .filter(|r| PairKey::new(&r.drug_a, &r.drug_b) == key)
            .collect())
    }

    async fn lookup_for_name(&self, drug_name: &str) -> PulseGuardResult<Vec<RawInteraction>> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(Self::unavailable(drug_name));
        }
        let name = normalize_name(drug_name);
        Ok(interaction_table()
            .into_iter()
            .filter(|r| normalize_name(&r.drug_a) == name || normalize_name(&r.drug_b) == name)
            .collect())
    }
}

// ── Drug info service (mock) ─────────────────────────────────────────────────

/// Monographs for a handful of common drugs. Unknown names are reported as
/// unavailable.
#[derive(Default)]
pub struct MockDrugInfo;

#[async_trait]
impl DrugInfoService for MockDrugInfo {
    async fn monograph(&self, drug_name: &str) -> PulseGuardResult<Monograph> {
        let (description, side_effects, boxed_warnings) = match normalize_name(drug_name).as_str() {
            "warfarin" => (
                "Vitamin K antagonist anticoagulant.",
                "Bruising, nosebleeds, prolonged bleeding from cuts.",
                "May cause major or fatal bleeding. Regular INR monitoring is required.",
            ),
            "aspirin" => (
                "Salicylate analgesic and antiplatelet agent.",
                "Stomach upset, heartburn.",
                "",
            ),
            "metformin" => (
                "Biguanide for type 2 diabetes mellitus.",
                "Nausea, diarrhea, metallic taste.",
                "Lactic acidosis has been reported, mostly with renal impairment.",
            ),
            "lisinopril" => (
                "ACE inhibitor for hypertension and heart failure.",
                "Dry cough, dizziness.",
                "Discontinue as soon as possible when pregnancy is detected.",
            ),
            _ => {
                return Err(PulseGuardError::LookupUnavailable {
                    service: "drug info".to_string(),
                    subject: drug_name.to_string(),
                    reason: "no monograph on file".to_string(),
                })
            }
        };
        Ok(Monograph {
            description: description.to_string(),
            side_effects: side_effects.to_string(),
            boxed_warnings: boxed_warnings.to_string(),
        })
    }
}

// ── Patients and prescriptions (mock) ────────────────────────────────────────

pub fn demo_patient() -> PatientId {
    PatientId("patient-0042".to_string())
}

/// A pill prescription for the demo patient. Half-life and stock threshold
/// are left to the intake defaults when `half_life_hours` is `None`.
pub fn prescription(
    name: &str,
    dose_amount: f64,
    dose_unit: &str,
    frequency_hours: f64,
    half_life_hours: Option<f64>,
    current_stock: f64,
) -> NewMedication {
    NewMedication {
        patient_id: demo_patient(),
        name: name.to_string(),
        form: MedicationForm::Pill,
        dose_amount,
        dose_unit: Some(dose_unit.to_string()),
        frequency_hours,
        half_life_hours,
        current_stock,
        stock_threshold: None,
    }
}
