//! Medication identity and record types.
//!
//! A `Medication` is owned by a patient and mutated only by dose-log and
//! stock-adjustment events. Its next due time is never stored: it is derived
//! from the last logged or missed dose (or the creation anchor) on every read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    dose::DoseEventStatus,
    error::{PulseGuardError, PulseGuardResult},
};

/// Longest accepted dosing interval or half-life: one year.
pub const MAX_SCHEDULE_HOURS: f64 = 24.0 * 365.0;

/// Stable identifier for a medication record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MedicationId(pub uuid::Uuid);

impl MedicationId {
    /// Create a new, unique medication ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MedicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MedicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the patient whose monitoring state a medication belongs to.
///
/// Example: PatientId("patient-0042")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientId(pub String);

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical form of a medication. Drives the default dose unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationForm {
    Pill,
    Liquid,
    Injection,
}

impl MedicationForm {
    /// Unit used when the caller does not supply one.
    pub fn default_dose_unit(&self) -> &'static str {
        match self {
            MedicationForm::Pill => "mg",
            MedicationForm::Liquid => "ml",
            MedicationForm::Injection => "ml",
        }
    }
}

/// Display-only drug information returned by the FDA/Drug Info service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monograph {
    pub description: String,
    pub side_effects: String,
    pub boxed_warnings: String,
}

/// A medication record as tracked by the monitoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub patient_id: PatientId,
    /// Free text. Also the lookup key into the interaction and drug info services.
    pub name: String,
    pub form: MedicationForm,
    pub dose_amount: f64,
    pub dose_unit: String,
    pub frequency_hours: f64,
    pub half_life_hours: f64,
    pub current_stock: f64,
    pub stock_threshold: f64,
    /// Wall-clock time of the last `taken` or `skipped` log, if any.
    pub last_dose_time: Option<DateTime<Utc>>,
    /// Scheduled time of the most recent dose reclassified as missed since
    /// the last `taken` or `skipped` log. Cleared by the next such log.
    #[serde(default)]
    pub last_missed_time: Option<DateTime<Utc>>,
    /// Creation time; the schedule anchor until the first dose is logged.
    pub created_at: DateTime<Utc>,
    /// When `current_stock` last changed. Used to re-arm low-stock alerts.
    pub stock_changed_at: DateTime<Utc>,
    /// False once the medication has been deactivated (soft delete).
    pub active: bool,
    #[serde(default)]
    pub monograph: Option<Monograph>,
}

impl Medication {
    /// The due time derived from the last missed or logged dose, or the
    /// creation anchor when nothing has happened yet.
    ///
    /// Saturates at the latest representable instant instead of overflowing.
    pub fn next_dose_time(&self) -> DateTime<Utc> {
        match self.last_missed_time.or(self.last_dose_time) {
            Some(last) => last
                .checked_add_signed(hours(self.frequency_hours))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => self.created_at,
        }
    }

    /// Apply the derived effects of a dose log recorded at `time`.
    ///
    /// `taken` and `skipped` set `last_dose_time` and clear the missed
    /// anchor; `taken` also draws down stock, floored at zero. `missed` only
    /// moves the missed anchor. `pending` changes nothing.
    pub fn record_dose(&mut self, status: DoseEventStatus, time: DateTime<Utc>) {
        match status {
            DoseEventStatus::Pending => {}
            DoseEventStatus::Missed => self.last_missed_time = Some(time),
            DoseEventStatus::Taken | DoseEventStatus::Skipped => {
                self.last_dose_time = Some(time);
                self.last_missed_time = None;
                if status == DoseEventStatus::Taken {
                    let stock = (self.current_stock - self.dose_amount).max(0.0);
                    if stock != self.current_stock {
                        self.current_stock = stock;
                        self.stock_changed_at = time;
                    }
                }
            }
        }
    }

    /// True when stock is at or below the configured threshold.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.stock_threshold
    }
}

/// Input for adding a medication. Optional fields are defaulted at the
/// intake boundary, never inside the safety logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedication {
    pub patient_id: PatientId,
    pub name: String,
    pub form: MedicationForm,
    pub dose_amount: f64,
    #[serde(default)]
    pub dose_unit: Option<String>,
    pub frequency_hours: f64,
    #[serde(default)]
    pub half_life_hours: Option<f64>,
    pub current_stock: f64,
    #[serde(default)]
    pub stock_threshold: Option<f64>,
}

/// A partial update sent to the Medication Store.
///
/// `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationPatch {
    pub current_stock: Option<f64>,
    pub stock_changed_at: Option<DateTime<Utc>>,
    pub last_dose_time: Option<DateTime<Utc>>,
    pub active: Option<bool>,
    pub monograph: Option<Monograph>,
}

impl MedicationPatch {
    /// Apply every present field of this patch to `medication`.
    pub fn apply_to(&self, medication: &mut Medication) {
        if let Some(stock) = self.current_stock {
            medication.current_stock = stock;
        }
        if let Some(at) = self.stock_changed_at {
            medication.stock_changed_at = at;
        }
        if let Some(at) = self.last_dose_time {
            medication.last_dose_time = Some(at);
        }
        if let Some(active) = self.active {
            medication.active = active;
        }
        if let Some(monograph) = &self.monograph {
            medication.monograph = Some(monograph.clone());
        }
    }
}

/// Convert fractional hours to a chrono `Duration` at millisecond precision.
///
/// Out-of-range values saturate. NaN maps to zero.
pub fn hours(value: f64) -> Duration {
    let millis = (value * 3_600_000.0).round();
    if millis.is_nan() {
        Duration::zero()
    } else if millis >= i64::MAX as f64 {
        Duration::MAX
    } else if millis <= -(i64::MAX as f64) {
        Duration::MIN
    } else {
        Duration::milliseconds(millis as i64)
    }
}

/// `at + hours(value)`, failing instead of overflowing.
pub fn after_hours(at: DateTime<Utc>, value: f64) -> PulseGuardResult<DateTime<Utc>> {
    at.checked_add_signed(hours(value)).ok_or_else(|| PulseGuardError::InvalidScheduleConfig {
        reason: format!("{value} hours after {at} is out of range"),
    })
}
