//! Per-medication dose schedule state.
//!
//! `DoseScheduler` owns, for every tracked medication, the single pending
//! `DoseEvent` and a bounded history of terminal events. It answers "what is
//! due" on demand and applies dose logs as one transition that updates the
//! event, the stock and the next due time together.
//!
//! The scheduler holds no lock of its own. The owner serializes access so
//! that a dose log and a scheduler tick never interleave.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use pulseguard_contracts::{
    dose::{DoseEvent, DoseEventStatus, DueStatus},
    error::{PulseGuardError, PulseGuardResult},
    medication::{after_hours, hours, Medication, MedicationId},
};

use crate::concentration::DosingSchedule;

/// Terminal events retained per medication, newest first.
pub const HISTORY_LIMIT: usize = 30;

/// Upper bound on missed-dose rollovers applied to one medication per call.
const MAX_ROLLOVERS_PER_CALL: usize = 48;

/// The due status of `medication` at `now`, from its derived next due time.
pub fn status(medication: &Medication, now: DateTime<Utc>) -> DueStatus {
    let next = medication.active.then(|| medication.next_dose_time());
    due_status(medication, next, now)
}

fn due_status(medication: &Medication, next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DueStatus {
    let is_overdue = matches!(next, Some(t) if t < now);
    let minutes_overdue = match next {
        Some(t) if is_overdue => (now - t).num_milliseconds().div_euclid(60_000),
        _ => 0,
    };
    DueStatus {
        medication_id: medication.id,
        next_dose_time: next,
        is_overdue,
        minutes_overdue,
        is_low_stock: medication.is_low_stock(),
    }
}

/// The result of logging one dose.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseOutcome {
    /// The formerly pending event, now terminal.
    pub completed: DoseEvent,
    /// The new pending event, due `frequency_hours` after the action.
    pub next_pending: DoseEvent,
    pub stock_before: f64,
    pub stock_after: f64,
}

/// A dose reclassified as missed during a scheduler pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MissedDose {
    pub medication: Medication,
    pub event: DoseEvent,
}

/// Schedule state of one medication.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicationSchedule {
    pub medication: Medication,
    pub pending: DoseEvent,
    /// Terminal events, newest first, at most `HISTORY_LIMIT`.
    pub history: VecDeque<DoseEvent>,
}

impl MedicationSchedule {
    pub fn new(medication: Medication) -> Self {
        let pending = DoseEvent::pending(medication.id, medication.next_dose_time());
        Self { medication, pending, history: VecDeque::new() }
    }

    /// `None` once the medication is deactivated.
    pub fn next_dose_time(&self) -> Option<DateTime<Utc>> {
        self.medication.active.then_some(self.pending.scheduled_time)
    }

    pub fn status(&self, now: DateTime<Utc>) -> DueStatus {
        due_status(&self.medication, self.next_dose_time(), now)
    }

    /// The decay model inputs built from this schedule's taken doses, with
    /// projection starting no earlier than `from`.
    ///
    /// An overdue dose that was never taken is projected at `from`, not at
    /// its past due time.
    pub fn dosing_schedule(&self, from: DateTime<Utc>) -> DosingSchedule {
        DosingSchedule {
            half_life_hours: self.medication.half_life_hours,
            frequency_hours: self.medication.frequency_hours,
            taken_doses: self
                .history
                .iter()
                .filter(|e| e.status == DoseEventStatus::Taken)
                .filter_map(|e| e.actual_time)
                .collect(),
            next_dose_time: self.next_dose_time().map(|next| next.max(from)),
        }
    }

    /// Compute what logging `status` at `at` would do, without applying it.
    pub fn preview_log(&self, status: DoseEventStatus, at: DateTime<Utc>) -> PulseGuardResult<DoseOutcome> {
        if !matches!(status, DoseEventStatus::Taken | DoseEventStatus::Skipped) {
            return Err(PulseGuardError::StateMachineError {
                reason: format!("a dose can only be logged as taken or skipped, not {status}"),
            });
        }
        if !self.medication.active {
            return Err(PulseGuardError::StateMachineError {
                reason: format!("medication '{}' is deactivated", self.medication.name),
            });
        }

        let completed = DoseEvent {
            actual_time: Some(at),
            status,
            ..self.pending.clone()
        };
        let next_pending =
            DoseEvent::pending(self.medication.id, after_hours(at, self.medication.frequency_hours)?);

        let stock_before = self.medication.current_stock;
        let stock_after = if status == DoseEventStatus::Taken {
            (stock_before - self.medication.dose_amount).max(0.0)
        } else {
            stock_before
        };

        Ok(DoseOutcome { completed, next_pending, stock_before, stock_after })
    }

    /// Apply a previewed outcome. The caller persists it first.
    fn apply(&mut self, outcome: &DoseOutcome) {
        let at = outcome.completed.actual_time.unwrap_or(outcome.completed.scheduled_time);
        self.medication.last_dose_time = Some(at);
        self.medication.last_missed_time = None;
        if outcome.stock_after != outcome.stock_before {
            self.medication.current_stock = outcome.stock_after;
            self.medication.stock_changed_at = at;
        }
        self.push_history(outcome.completed.clone());
        self.pending = outcome.next_pending.clone();
    }

    fn push_history(&mut self, event: DoseEvent) {
        self.history.push_front(event);
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Move every pending dose more than `threshold` in the past to `missed`,
    /// deriving the next pending event `frequency_hours` after each.
    fn reclassify_missed(&mut self, now: DateTime<Utc>, threshold: Duration) -> Vec<DoseEvent> {
        let mut missed = Vec::new();
        if !self.medication.active {
            return missed;
        }
        let step = hours(self.medication.frequency_hours);

        loop {
            let past_due = self
                .pending
                .scheduled_time
                .checked_add_signed(threshold)
                .is_some_and(|deadline| deadline < now);
            if !past_due {
                break;
            }
            let Some(next) = self.pending.scheduled_time.checked_add_signed(step) else {
                warn!(medication_id = %self.medication.id, "next dose time out of range, leaving dose pending");
                break;
            };
            if missed.len() == MAX_ROLLOVERS_PER_CALL {
                warn!(
                    medication_id = %self.medication.id,
                    rollovers = missed.len(),
                    "missed-dose rollover limit reached, resuming next pass"
                );
                break;
            }
            let event = DoseEvent {
                status: DoseEventStatus::Missed,
                ..self.pending.clone()
            };
            self.medication.last_missed_time = Some(event.scheduled_time);
            self.pending = DoseEvent::pending(self.medication.id, next);
            self.push_history(event.clone());
            missed.push(event);
        }
        missed
    }
}

/// Schedule state for every medication of one patient.
#[derive(Debug, Clone)]
pub struct DoseScheduler {
    schedules: HashMap<MedicationId, MedicationSchedule>,
    missed_threshold: Duration,
}

impl DoseScheduler {
    /// `missed_threshold`: how far past due a pending dose may fall before it
    /// is reclassified as missed.
    pub fn new(missed_threshold: Duration) -> Self {
        Self { schedules: HashMap::new(), missed_threshold }
    }

    /// Start tracking `medication`, replacing any previous schedule for it.
    pub fn track(&mut self, medication: Medication) {
        debug!(medication_id = %medication.id, name = %medication.name, "tracking medication");
        self.schedules.insert(medication.id, MedicationSchedule::new(medication));
    }

    pub fn get(&self, id: MedicationId) -> PulseGuardResult<&MedicationSchedule> {
        self.schedules
            .get(&id)
            .ok_or_else(|| PulseGuardError::MedicationNotFound { id: id.to_string() })
    }

    fn get_mut(&mut self, id: MedicationId) -> PulseGuardResult<&mut MedicationSchedule> {
        self.schedules
            .get_mut(&id)
            .ok_or_else(|| PulseGuardError::MedicationNotFound { id: id.to_string() })
    }

    pub fn status(&self, id: MedicationId, now: DateTime<Utc>) -> PulseGuardResult<DueStatus> {
        Ok(self.get(id)?.status(now))
    }

    /// Due status of every active medication.
    pub fn statuses(&self, now: DateTime<Utc>) -> Vec<DueStatus> {
        self.schedules
            .values()
            .filter(|s| s.medication.active)
            .map(|s| s.status(now))
            .collect()
    }

    /// Every active medication, sorted by name for stable pair ordering.
    pub fn active_medications(&self) -> Vec<Medication> {
        let mut meds: Vec<Medication> = self
            .schedules
            .values()
            .filter(|s| s.medication.active)
            .map(|s| s.medication.clone())
            .collect();
        meds.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        meds
    }

    /// A consistent copy of every active schedule.
    pub fn snapshot(&self) -> Vec<MedicationSchedule> {
        self.schedules.values().filter(|s| s.medication.active).cloned().collect()
    }

    pub fn preview_log(
        &self,
        id: MedicationId,
        status: DoseEventStatus,
        at: DateTime<Utc>,
    ) -> PulseGuardResult<DoseOutcome> {
        self.get(id)?.preview_log(status, at)
    }

    /// Apply an outcome obtained from `preview_log` for the same medication.
    pub fn commit_log(&mut self, id: MedicationId, outcome: &DoseOutcome) -> PulseGuardResult<()> {
        let schedule = self.get_mut(id)?;
        if schedule.pending.id != outcome.completed.id {
            return Err(PulseGuardError::StateMachineError {
                reason: "pending dose changed since the log was prepared".to_string(),
            });
        }
        schedule.apply(outcome);
        info!(
            medication_id = %id,
            status = %outcome.completed.status,
            stock = outcome.stock_after,
            next_dose_time = %outcome.next_pending.scheduled_time,
            "dose logged"
        );
        Ok(())
    }

    /// Log a `taken` or `skipped` dose at `at`, in one step.
    pub fn log_dose(
        &mut self,
        id: MedicationId,
        status: DoseEventStatus,
        at: DateTime<Utc>,
    ) -> PulseGuardResult<DoseOutcome> {
        let outcome = self.preview_log(id, status, at)?;
        self.commit_log(id, &outcome)?;
        Ok(outcome)
    }

    /// Replace the stock level of a medication.
    pub fn adjust_stock(&mut self, id: MedicationId, stock: f64, at: DateTime<Utc>) -> PulseGuardResult<()> {
        if !stock.is_finite() || stock < 0.0 {
            return Err(PulseGuardError::InvalidScheduleConfig {
                reason: format!("current_stock must be non-negative, got {stock}"),
            });
        }
        let schedule = self.get_mut(id)?;
        schedule.medication.current_stock = stock;
        schedule.medication.stock_changed_at = at;
        Ok(())
    }

    /// Stop monitoring a medication. Its history is kept.
    pub fn deactivate(&mut self, id: MedicationId) -> PulseGuardResult<Medication> {
        let schedule = self.get_mut(id)?;
        schedule.medication.active = false;
        info!(medication_id = %id, "medication deactivated");
        Ok(schedule.medication.clone())
    }

    /// Reclassify overdue pending doses as missed across all medications.
    pub fn reclassify_missed(&mut self, now: DateTime<Utc>) -> Vec<MissedDose> {
        let threshold = self.missed_threshold;
        let mut all = Vec::new();
        for schedule in self.schedules.values_mut() {
            for event in schedule.reclassify_missed(now, threshold) {
                info!(
                    medication_id = %schedule.medication.id,
                    scheduled_time = %event.scheduled_time,
                    "dose reclassified as missed"
                );
                all.push(MissedDose { medication: schedule.medication.clone(), event });
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use pulseguard_contracts::medication::{MedicationForm, PatientId};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn make_med(name: &str) -> Medication {
        Medication {
            id: MedicationId::new(),
            patient_id: PatientId("patient-1".to_string()),
            name: name.to_string(),
            form: MedicationForm::Pill,
            dose_amount: 2.0,
            dose_unit: "mg".to_string(),
            frequency_hours: 8.0,
            half_life_hours: 6.0,
            current_stock: 10.0,
            stock_threshold: 5.0,
            last_dose_time: None,
            last_missed_time: None,
            created_at: t0(),
            stock_changed_at: t0(),
            active: true,
            monograph: None,
        }
    }

    fn scheduler_with(med: &Medication) -> DoseScheduler {
        let mut scheduler = DoseScheduler::new(Duration::minutes(60));
        scheduler.track(med.clone());
        scheduler
    }

    #[test]
    fn overdue_by_ten_minutes() {
        let med = make_med("Amoxicillin");
        let scheduler = scheduler_with(&med);

        let status = scheduler.status(med.id, t0() + Duration::minutes(10)).unwrap();
        assert!(status.is_overdue);
        assert_eq!(status.minutes_overdue, 10);

        // Exactly at the due instant is not overdue.
        let status = scheduler.status(med.id, t0()).unwrap();
        assert!(!status.is_overdue);
        assert_eq!(status.minutes_overdue, 0);
    }

    #[test]
    fn minutes_overdue_floors_partial_minutes() {
        let med = make_med("Amoxicillin");
        let status = status(&med, t0() + Duration::seconds(179));
        assert_eq!(status.minutes_overdue, 2);
    }

    #[test]
    fn stock_at_threshold_is_low() {
        let mut med = make_med("Amoxicillin");
        med.current_stock = 5.0;
        med.stock_threshold = 5.0;
        assert!(status(&med, t0()).is_low_stock);
    }

    #[test]
    fn taken_decrements_stock_and_advances_from_action_time() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);

        // Logged 40 minutes early: accepted, next due is anchored at the action.
        let at = t0() - Duration::minutes(40);
        let outcome = scheduler.log_dose(med.id, DoseEventStatus::Taken, at).unwrap();

        assert_eq!(outcome.completed.status, DoseEventStatus::Taken);
        assert_eq!(outcome.completed.actual_time, Some(at));
        assert_eq!(outcome.stock_before - outcome.stock_after, 2.0);

        let schedule = scheduler.get(med.id).unwrap();
        assert_eq!(schedule.medication.current_stock, 8.0);
        assert_eq!(schedule.next_dose_time(), Some(at + Duration::hours(8)));
        assert_eq!(schedule.medication.next_dose_time(), at + Duration::hours(8));
        assert_eq!(schedule.history.len(), 1);
    }

    #[test]
    fn skipped_leaves_stock_unchanged_but_advances() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);

        let at = t0() + Duration::hours(3);
        scheduler.log_dose(med.id, DoseEventStatus::Skipped, at).unwrap();

        let schedule = scheduler.get(med.id).unwrap();
        assert_eq!(schedule.medication.current_stock, 10.0);
        assert_eq!(schedule.medication.stock_changed_at, t0());
        assert_eq!(schedule.next_dose_time(), Some(at + Duration::hours(8)));
    }

    #[test]
    fn stock_never_goes_negative() {
        let mut med = make_med("Amoxicillin");
        med.current_stock = 1.0;
        let mut scheduler = scheduler_with(&med);

        let outcome = scheduler.log_dose(med.id, DoseEventStatus::Taken, t0()).unwrap();
        assert_eq!(outcome.stock_after, 0.0);
    }

    #[test]
    fn only_taken_or_skipped_can_be_logged() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);

        for status in [DoseEventStatus::Pending, DoseEventStatus::Missed] {
            let err = scheduler.log_dose(med.id, status, t0()).unwrap_err();
            assert!(matches!(err, PulseGuardError::StateMachineError { .. }));
        }
    }

    #[test]
    fn stale_preview_cannot_be_committed() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);

        let stale = scheduler.preview_log(med.id, DoseEventStatus::Taken, t0()).unwrap();
        scheduler.log_dose(med.id, DoseEventStatus::Skipped, t0()).unwrap();

        assert!(scheduler.commit_log(med.id, &stale).is_err());
        assert_eq!(scheduler.get(med.id).unwrap().medication.current_stock, 10.0);
    }

    #[test]
    fn missed_dose_is_reclassified_once_and_rolls_forward() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);

        // Exactly at the threshold: still pending.
        assert!(scheduler.reclassify_missed(t0() + Duration::minutes(60)).is_empty());

        let missed = scheduler.reclassify_missed(t0() + Duration::minutes(61));
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].event.status, DoseEventStatus::Missed);
        assert_eq!(missed[0].event.scheduled_time, t0());

        // The next pending dose is one frequency after the missed one.
        let schedule = scheduler.get(med.id).unwrap();
        assert_eq!(schedule.next_dose_time(), Some(t0() + Duration::hours(8)));

        // A second pass at the same instant finds nothing new.
        assert!(scheduler.reclassify_missed(t0() + Duration::minutes(61)).is_empty());
    }

    #[test]
    fn long_absence_misses_every_elapsed_dose() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);

        // Doses due at 0h, 8h, 16h are all more than an hour past at 17h30.
        let missed = scheduler.reclassify_missed(t0() + Duration::minutes(17 * 60 + 30));
        assert_eq!(missed.len(), 3);
        assert_eq!(
            scheduler.get(med.id).unwrap().next_dose_time(),
            Some(t0() + Duration::hours(24))
        );
    }

    #[test]
    fn deactivated_medication_is_not_due_and_cannot_be_logged() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);
        scheduler.deactivate(med.id).unwrap();

        let status = scheduler.status(med.id, t0() + Duration::hours(5)).unwrap();
        assert_eq!(status.next_dose_time, None);
        assert!(!status.is_overdue);
        assert!(scheduler.statuses(t0()).is_empty());
        assert!(scheduler.log_dose(med.id, DoseEventStatus::Taken, t0()).is_err());
        assert!(scheduler.reclassify_missed(t0() + Duration::days(2)).is_empty());
    }

    #[test]
    fn dosing_schedule_uses_only_taken_doses() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);
        scheduler.log_dose(med.id, DoseEventStatus::Skipped, t0()).unwrap();
        let taken_at = t0() + Duration::hours(8);
        scheduler.log_dose(med.id, DoseEventStatus::Taken, taken_at).unwrap();

        let dosing = scheduler.get(med.id).unwrap().dosing_schedule(taken_at);
        assert_eq!(dosing.taken_doses, vec![taken_at]);
        assert_eq!(dosing.next_dose_time, Some(taken_at + Duration::hours(8)));
    }

    #[test]
    fn overdue_untaken_dose_is_projected_from_now() {
        let med = make_med("Amoxicillin");
        let scheduler = scheduler_with(&med);

        // Due at t0, never taken, viewed 30 minutes later.
        let now = t0() + Duration::minutes(30);
        let dosing = scheduler.get(med.id).unwrap().dosing_schedule(now);
        assert!(dosing.taken_doses.is_empty());
        assert_eq!(dosing.next_dose_time, Some(now));
    }

    #[test]
    fn missed_dose_is_recorded_on_the_medication() {
        let med = make_med("Amoxicillin");
        let mut scheduler = scheduler_with(&med);
        scheduler.reclassify_missed(t0() + Duration::minutes(61));

        let schedule = scheduler.get(med.id).unwrap();
        assert_eq!(schedule.medication.last_missed_time, Some(t0()));
        assert_eq!(schedule.medication.last_dose_time, None);

        // A record rebuilt from the persisted medication resumes at the
        // rolled-forward dose instead of the missed one.
        let rebuilt = MedicationSchedule::new(schedule.medication.clone());
        assert_eq!(rebuilt.next_dose_time(), Some(t0() + Duration::hours(8)));

        let at = t0() + Duration::hours(8);
        scheduler.log_dose(med.id, DoseEventStatus::Taken, at).unwrap();
        let schedule = scheduler.get(med.id).unwrap();
        assert_eq!(schedule.medication.last_missed_time, None);
        assert_eq!(schedule.medication.next_dose_time(), at + Duration::hours(8));
    }

    #[test]
    fn unrepresentable_next_dose_is_an_error_not_a_panic() {
        let mut med = make_med("Amoxicillin");
        med.frequency_hours = 1e12;
        let mut scheduler = scheduler_with(&med);

        let err = scheduler.log_dose(med.id, DoseEventStatus::Taken, t0()).unwrap_err();
        assert!(matches!(err, PulseGuardError::InvalidScheduleConfig { .. }));
        assert_eq!(scheduler.get(med.id).unwrap().medication.current_stock, 10.0);

        // Rolling a missed dose forward past the calendar leaves it pending.
        let mut scheduler = DoseScheduler::new(Duration::minutes(60));
        scheduler.track(med.clone());
        let missed = scheduler.reclassify_missed(t0() + Duration::hours(2));
        assert!(missed.is_empty());
    }

    #[test]
    fn unknown_medication_is_reported() {
        let scheduler = DoseScheduler::new(Duration::minutes(60));
        assert!(matches!(
            scheduler.status(MedicationId::new(), t0()),
            Err(PulseGuardError::MedicationNotFound { .. })
        ));
    }
}
