//! Pharmacokinetic overlap check.
//!
//! A dose is considered active in the body from the time it is taken until
//! `clearance_half_lives * half_life_hours` later. Two medications whose
//! active windows are both open at some instant from `now` on, and whose
//! names match a known critical combination, produce a critical finding.
//! No external lookup is involved.

use chrono::{DateTime, Utc};

use pulseguard_contracts::{
    interaction::{InteractionFinding, Severity},
    medication::{hours, Medication},
};
use pulseguard_policy::SeverityClassifier;

/// The `source` of every finding produced here.
pub const OVERLAP_SOURCE: &str = "pharmacokinetic-overlap";

/// The interval during which a dose is modeled as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ActiveWindow {
    /// `None` for a non-positive half-life or multiplier.
    pub fn from_dose(
        dose_time: DateTime<Utc>,
        half_life_hours: f64,
        clearance_half_lives: f64,
    ) -> Option<Self> {
        let span = half_life_hours * clearance_half_lives;
        if !span.is_finite() || span <= 0.0 {
            return None;
        }
        let end = dose_time
            .checked_add_signed(hours(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(Self { start: dose_time, end })
    }

    /// The window of an existing medication: from its last dose, or from
    /// its next scheduled dose if it was never taken.
    pub fn for_medication(medication: &Medication, clearance_half_lives: f64) -> Option<Self> {
        let anchor = medication.last_dose_time.unwrap_or_else(|| medication.next_dose_time());
        Self::from_dose(anchor, medication.half_life_hours, clearance_half_lives)
    }

    /// True when both windows are open together at some instant after `now`.
    pub fn overlaps_from(&self, other: &ActiveWindow, now: DateTime<Utc>) -> bool {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        start < end && end > now
    }
}

/// One side of an overlap check.
#[derive(Debug, Clone, Copy)]
pub struct ActiveDrug<'a> {
    pub name: &'a str,
    pub window: ActiveWindow,
}

/// A critical finding when both drugs are active together and form a known
/// critical combination.
pub fn overlap_finding(
    classifier: &SeverityClassifier,
    a: ActiveDrug<'_>,
    b: ActiveDrug<'_>,
    now: DateTime<Utc>,
) -> Option<InteractionFinding> {
    if !a.window.overlaps_from(&b.window, now) {
        return None;
    }
    let (x, y) = classifier.matching_combo(a.name, b.name)?;
    Some(InteractionFinding {
        drug_a: a.name.to_string(),
        drug_b: b.name.to_string(),
        severity: Severity::Critical,
        description: format!(
            "Pharmacokinetic overlap: both medications will be active in the body at the \
             same time ({x} with {y})"
        ),
        source: OVERLAP_SOURCE.to_string(),
    })
}
