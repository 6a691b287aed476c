//! Input boundary for new medications.
//!
//! Defaults are filled in here and nowhere else. Explicitly invalid numbers
//! are rejected with `InvalidScheduleConfig`, never silently replaced.

use chrono::{DateTime, Utc};
use tracing::debug;

use pulseguard_contracts::{
    error::{PulseGuardError, PulseGuardResult},
    medication::{Medication, MedicationId, NewMedication},
};

use crate::concentration::validate_schedule;

/// Defaults and lower bounds applied when admitting a medication.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeDefaults {
    /// Used when the caller does not know the half-life.
    pub default_half_life_hours: f64,
    pub min_frequency_hours: f64,
    pub default_stock_threshold: f64,
}

impl Default for IntakeDefaults {
    fn default() -> Self {
        Self {
            default_half_life_hours: 6.0,
            min_frequency_hours: 0.5,
            default_stock_threshold: 5.0,
        }
    }
}

fn invalid(reason: String) -> PulseGuardError {
    PulseGuardError::InvalidScheduleConfig { reason }
}

/// Validate `new` and build the `Medication` record created at `now`.
pub fn admit(
    new: NewMedication,
    defaults: &IntakeDefaults,
    now: DateTime<Utc>,
) -> PulseGuardResult<Medication> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(invalid("medication name must not be empty".to_string()));
    }

    if !new.dose_amount.is_finite() || new.dose_amount <= 0.0 {
        return Err(invalid(format!("dose_amount must be positive, got {}", new.dose_amount)));
    }

    if !new.frequency_hours.is_finite() || new.frequency_hours < defaults.min_frequency_hours {
        return Err(invalid(format!(
            "frequency_hours must be at least {}, got {}",
            defaults.min_frequency_hours, new.frequency_hours
        )));
    }

    let half_life_hours = match new.half_life_hours {
        Some(h) if h.is_finite() && h > 0.0 => h,
        Some(h) => return Err(invalid(format!("half_life_hours must be positive, got {h}"))),
        None => {
            debug!(
                medication = %name,
                default = defaults.default_half_life_hours,
                "half-life unknown, applying default"
            );
            defaults.default_half_life_hours
        }
    };

    validate_schedule(half_life_hours, new.frequency_hours)?;

    if !new.current_stock.is_finite() || new.current_stock < 0.0 {
        return Err(invalid(format!(
            "current_stock must be non-negative, got {}",
            new.current_stock
        )));
    }

    let stock_threshold = match new.stock_threshold {
        Some(s) if s.is_finite() && s > 0.0 => s,
        Some(s) => return Err(invalid(format!("stock_threshold must be positive, got {s}"))),
        None => defaults.default_stock_threshold,
    };

    let dose_unit = new
        .dose_unit
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| new.form.default_dose_unit().to_string());

    Ok(Medication {
        id: MedicationId::new(),
        patient_id: new.patient_id,
        name,
        form: new.form,
        dose_amount: new.dose_amount,
        dose_unit,
        frequency_hours: new.frequency_hours,
        half_life_hours,
        current_stock: new.current_stock,
        stock_threshold,
        last_dose_time: None,
        last_missed_time: None,
        created_at: now,
        stock_changed_at: now,
        active: true,
        monograph: None,
    })
}

/// Check a stored record against the same bounds `admit` enforces on input.
pub fn validate_record(medication: &Medication, defaults: &IntakeDefaults) -> PulseGuardResult<()> {
    if !medication.frequency_hours.is_finite()
        || medication.frequency_hours < defaults.min_frequency_hours
    {
        return Err(invalid(format!(
            "medication '{}': frequency_hours must be at least {}, got {}",
            medication.name, defaults.min_frequency_hours, medication.frequency_hours
        )));
    }
    validate_schedule(medication.half_life_hours, medication.frequency_hours)
}
