//! The reminder state machine.
//!
//! Per medication, the pending dose moves through
//! `NotYetDue → Approaching → Overdue → Stale` as time passes. Entering
//! `Approaching` or `Overdue` emits one notification, deduplicated in the
//! ledger on `(medication, next dose time, kind)`: repeated ticks against the
//! same due time stay silent, and a logged dose (a new due time) re-arms it.
//! Nothing is emitted once `Stale`.
//!
//! The same ledger deduplicates missed-dose and low-stock alerts. The
//! scheduler also remembers which interaction findings it has already
//! alerted on and when the active set was last checked.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use pulseguard_contracts::{
    alert::{AlertDraft, AlertType, Notification, NotificationKind},
    interaction::{InteractionFinding, PairKey, Severity},
    medication::{Medication, MedicationId},
};
use pulseguard_core::schedule::{MedicationSchedule, MissedDose};
use pulseguard_interactions::InteractionReport;
use pulseguard_policy::SafetyPolicy;

use crate::ledger::{LedgerKey, ReminderLedger, TriggerKind};

/// Where a pending dose sits relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPhase {
    NotYetDue,
    /// Due within the approaching window, or due right now.
    Approaching,
    /// Past due, but not by more than the stale threshold.
    Overdue,
    /// Overdue beyond the stale threshold. Reminders are suppressed.
    Stale,
}

pub fn phase(
    next_dose_time: DateTime<Utc>,
    now: DateTime<Utc>,
    approaching_window: Duration,
    stale_after: Duration,
) -> ReminderPhase {
    if next_dose_time >= now {
        if next_dose_time - now <= approaching_window {
            ReminderPhase::Approaching
        } else {
            ReminderPhase::NotYetDue
        }
    } else if now - next_dose_time <= stale_after {
        ReminderPhase::Overdue
    } else {
        ReminderPhase::Stale
    }
}

/// Render a dose amount without a trailing `.0` for whole numbers.
pub fn format_amount(amount: f64, unit: &str) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{} {}", amount as i64, unit)
    } else {
        format!("{amount:.2} {unit}")
    }
}

/// What recording an interaction check produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutcome {
    /// New feed alerts: newly seen findings and, at most once per degraded
    /// active set, an "incomplete" warning.
    pub alerts: Vec<AlertDraft>,
    /// The unresolved critical interactions after this check.
    pub critical: Vec<InteractionFinding>,
}

#[derive(Debug, Clone, PartialEq)]
struct LastCheck {
    active_fingerprint: String,
    complete: bool,
}

#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    ledger: ReminderLedger,
    approaching_window: Duration,
    stale_after: Duration,
    last_check: Option<LastCheck>,
    alerted_findings: HashSet<(PairKey, Severity)>,
    incomplete_alerted_for: Option<String>,
    critical: Vec<InteractionFinding>,
}

impl ReminderScheduler {
    pub fn new(policy: &SafetyPolicy) -> Self {
        Self {
            ledger: ReminderLedger::new(policy.reminders.ledger_capacity, policy.stale_after()),
            approaching_window: policy.approaching_window(),
            stale_after: policy.stale_after(),
            last_check: None,
            alerted_findings: HashSet::new(),
            incomplete_alerted_for: None,
            critical: Vec::new(),
        }
    }

    pub fn ledger(&self) -> &ReminderLedger {
        &self.ledger
    }

    // ── Dose reminders ───────────────────────────────────────────────────────

    /// One notification per schedule that has newly entered `Approaching`
    /// or `Overdue` for its current due time.
    pub fn evaluate_doses(&mut self, schedules: &[MedicationSchedule], now: DateTime<Utc>) -> Vec<Notification> {
        let mut out = Vec::new();
        for schedule in schedules {
            let Some(next) = schedule.next_dose_time() else {
                continue;
            };
            let med = &schedule.medication;
            let kind = match phase(next, now, self.approaching_window, self.stale_after) {
                ReminderPhase::Approaching => TriggerKind::DoseApproaching,
                ReminderPhase::Overdue => TriggerKind::DoseOverdue,
                ReminderPhase::NotYetDue | ReminderPhase::Stale => continue,
            };
            if !self.ledger.try_claim(LedgerKey::new(med.id, next, kind), now) {
                continue;
            }
            debug!(medication_id = %med.id, kind = ?kind, next_dose_time = %next, "dose reminder due");
            out.push(dose_notification(med, next, kind, now));
        }
        out
    }

    // ── Feed alerts ──────────────────────────────────────────────────────────

    /// A missed-dose alert, once per missed dose.
    pub fn claim_missed(&mut self, missed: &MissedDose, now: DateTime<Utc>) -> Option<AlertDraft> {
        let med = &missed.medication;
        let key = LedgerKey::new(med.id, missed.event.scheduled_time, TriggerKind::MissedDose);
        if !self.ledger.try_claim(key, now) {
            return None;
        }
        Some(AlertDraft {
            alert_type: AlertType::MissedDose,
            severity: Severity::Warning,
            title: format!("Missed Dose: {}", med.name),
            message: format!(
                "The {} dose scheduled for {} was not logged.",
                format_amount(med.dose_amount, &med.dose_unit),
                missed.event.scheduled_time.format("%Y-%m-%d %H:%M UTC")
            ),
            medication_id: Some(med.id),
        })
    }

    /// A low-stock alert, once per stock level change while stock is low.
    pub fn claim_low_stock(&mut self, med: &Medication, now: DateTime<Utc>) -> Option<AlertDraft> {
        if !med.active || !med.is_low_stock() {
            return None;
        }
        let key = LedgerKey::new(med.id, med.stock_changed_at, TriggerKind::LowStock);
        if !self.ledger.try_claim(key, now) {
            return None;
        }
        Some(AlertDraft {
            alert_type: AlertType::LowStock,
            severity: Severity::Warning,
            title: format!("Low Stock: {}", med.name),
            message: format!(
                "Only {} remaining.",
                format_amount(med.current_stock, &med.dose_unit)
            ),
            medication_id: Some(med.id),
        })
    }

    // ── Interaction re-checks ────────────────────────────────────────────────

    /// True when the active set changed since the last check, or the last
    /// check was incomplete.
    pub fn needs_interaction_check(&self, active_fingerprint: &str) -> bool {
        match &self.last_check {
            Some(last) => !last.complete || last.active_fingerprint != active_fingerprint,
            None => true,
        }
    }

    /// Fold a finished check into the scheduler's memory.
    ///
    /// A complete check replaces what is known. An incomplete one keeps
    /// earlier findings for the pairs it could not check, so an outage never
    /// clears a known critical interaction.
    pub fn record_check(&mut self, report: &InteractionReport, active_fingerprint: &str) -> CheckOutcome {
        let complete = report.unavailable.is_empty();
        let mut alerts = Vec::new();

        for finding in &report.findings {
            if finding.severity == Severity::Info {
                continue;
            }
            if self.alerted_findings.insert(finding.dedup_key()) {
                alerts.push(interaction_alert(finding));
            }
        }

        let mut critical = report.critical();
        if complete {
            self.alerted_findings = report.findings.iter().map(|f| f.dedup_key()).collect();
            self.incomplete_alerted_for = None;
        } else {
            let unchecked: HashSet<&PairKey> = report.unavailable.iter().map(|p| &p.pair).collect();
            let carried = self
                .critical
                .iter()
                .filter(|f| unchecked.contains(&f.pair_key()))
                .filter(|f| !critical.iter().any(|c| c.dedup_key() == f.dedup_key()))
                .cloned()
                .collect::<Vec<_>>();
            critical.extend(carried);

            if self.incomplete_alerted_for.as_deref() != Some(active_fingerprint) {
                warn!(unavailable = report.unavailable.len(), "interaction check incomplete");
                self.incomplete_alerted_for = Some(active_fingerprint.to_string());
                let pairs: Vec<String> = report.unavailable.iter().map(|p| p.pair.to_string()).collect();
                alerts.push(AlertDraft {
                    alert_type: AlertType::Interaction,
                    severity: Severity::Warning,
                    title: "Interaction check incomplete".to_string(),
                    message: format!(
                        "Could not check {} pair(s): {}. Interaction safety for these pairs is \
                         unknown and will be re-checked.",
                        pairs.len(),
                        pairs.join(", ")
                    ),
                    medication_id: None,
                });
            }
        }

        self.critical = critical.clone();
        self.last_check = Some(LastCheck {
            active_fingerprint: active_fingerprint.to_string(),
            complete,
        });
        CheckOutcome { alerts, critical }
    }

    // ── Housekeeping ─────────────────────────────────────────────────────────

    /// Release ledger entries for `active` schedules (the full active set).
    pub fn release(&mut self, active: &[MedicationSchedule], now: DateTime<Utc>) -> usize {
        let tracked: HashSet<MedicationId> = active.iter().map(|s| s.medication.id).collect();
        self.ledger.release(
            now,
            |id| tracked.contains(&id),
            |key| {
                key.kind == TriggerKind::LowStock
                    && active.iter().any(|s| {
                        s.medication.id == key.medication_id
                            && s.medication.stock_changed_at == key.trigger_instant
                            && s.medication.is_low_stock()
                    })
            },
        )
    }
}

fn dose_notification(med: &Medication, next: DateTime<Utc>, kind: TriggerKind, now: DateTime<Utc>) -> Notification {
    let dose = format_amount(med.dose_amount, &med.dose_unit);
    let (kind, severity, title, body) = if kind == TriggerKind::DoseApproaching {
        (
            NotificationKind::DoseApproaching,
            Severity::Info,
            format!("Dose Due Soon: {}", med.name),
            format!("Take {dose} of {} at {}.", med.name, next.format("%H:%M UTC")),
        )
    } else {
        let minutes = (now - next).num_minutes();
        (
            NotificationKind::DoseOverdue,
            Severity::Warning,
            format!("Dose Overdue: {}", med.name),
            format!("{} ({dose}) was due {minutes} minute(s) ago.", med.name),
        )
    };
    Notification {
        kind,
        severity,
        title,
        body,
        medication_id: Some(med.id),
        alert_id: None,
        created_at: now,
    }
}

fn interaction_alert(finding: &InteractionFinding) -> AlertDraft {
    let title = if finding.is_critical() {
        format!("Critical Interaction: {}", finding.pair_key())
    } else {
        format!("Interaction Warning: {}", finding.pair_key())
    };
    AlertDraft {
        alert_type: AlertType::Interaction,
        severity: finding.severity,
        title,
        message: format!("{} (source: {})", finding.description, finding.source),
        medication_id: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use pulseguard_contracts::{
        dose::{DoseEvent, DoseEventStatus},
        interaction::PairFailure,
        medication::{MedicationForm, PatientId},
    };
    use pulseguard_core::schedule::DoseScheduler;

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
            dose_amount: 1.0,
            dose_unit: "mg".to_string(),
            frequency_hours: 8.0,
            half_life_hours: 6.0,
            current_stock: 30.0,
            stock_threshold: 5.0,
            last_dose_time: None,
            last_missed_time: None,
            created_at: t0(),
            stock_changed_at: t0(),
            active: true,
            monograph: None,
        }
    }

    fn finding(a: &str, b: &str, severity: Severity) -> InteractionFinding {
        InteractionFinding {
            drug_a: a.to_string(),
            drug_b: b.to_string(),
            severity,
            description: "d".to_string(),
            source: "mock".to_string(),
        }
    }

    fn report(findings: Vec<InteractionFinding>, unavailable: Vec<PairFailure>) -> InteractionReport {
        InteractionReport {
            findings,
            unavailable,
            pairs_checked: 1,
            fingerprint: "fp".to_string(),
        }
    }

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn phases_follow_the_due_time() {
        let (w, s) = (minutes(5), minutes(60));
        assert_eq!(phase(t0(), t0() - minutes(6), w, s), ReminderPhase::NotYetDue);
        assert_eq!(phase(t0(), t0() - minutes(5), w, s), ReminderPhase::Approaching);
        assert_eq!(phase(t0(), t0(), w, s), ReminderPhase::Approaching);
        assert_eq!(phase(t0(), t0() + minutes(1), w, s), ReminderPhase::Overdue);
        assert_eq!(phase(t0(), t0() + minutes(60), w, s), ReminderPhase::Overdue);
        assert_eq!(phase(t0(), t0() + minutes(61), w, s), ReminderPhase::Stale);
    }

    /// Many ticks against one due time emit once per phase entered; logging
    /// a dose moves the due time and re-arms the reminder.
    #[test]
    fn reminder_is_emitted_at_most_once_per_due_time() {
        let policy = SafetyPolicy::default();
        let mut reminders = ReminderScheduler::new(&policy);
        let med = make_med("Metformin");
        let mut doses = DoseScheduler::new(policy.missed_dose_threshold());
        doses.track(med.clone());

        let mut emitted = Vec::new();
        for tick in 0..10 {
            let now = t0() - minutes(4) + minutes(tick);
            emitted.extend(reminders.evaluate_doses(&doses.snapshot(), now));
        }
        let kinds: Vec<NotificationKind> = emitted.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::DoseApproaching, NotificationKind::DoseOverdue]);

        // The dose is logged: the next dose is 8 hours out.
        let logged_at = t0() + minutes(6);
        doses.log_dose(med.id, DoseEventStatus::Taken, logged_at).unwrap();
        let next = logged_at + Duration::hours(8);
        assert!(reminders.evaluate_doses(&doses.snapshot(), logged_at).is_empty());

        let again = reminders.evaluate_doses(&doses.snapshot(), next - minutes(2));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].kind, NotificationKind::DoseApproaching);
    }

    #[test]
    fn stale_doses_are_silent() {
        let policy = SafetyPolicy::default();
        let mut reminders = ReminderScheduler::new(&policy);
        let schedules = vec![MedicationSchedule::new(make_med("Metformin"))];

        assert!(reminders.evaluate_doses(&schedules, t0() + minutes(90)).is_empty());
    }

    #[test]
    fn missed_dose_is_alerted_once() {
        let mut reminders = ReminderScheduler::new(&SafetyPolicy::default());
        let med = make_med("Lisinopril");
        let missed = MissedDose {
            event: DoseEvent { status: DoseEventStatus::Missed, ..DoseEvent::pending(med.id, t0()) },
            medication: med,
        };

        let alert = reminders.claim_missed(&missed, t0() + minutes(61)).unwrap();
        assert_eq!(alert.title, "Missed Dose: Lisinopril");
        assert_eq!(alert.alert_type, AlertType::MissedDose);
        assert!(reminders.claim_missed(&missed, t0() + minutes(62)).is_none());
    }

    #[test]
    fn low_stock_is_alerted_once_per_stock_change() {
        let mut reminders = ReminderScheduler::new(&SafetyPolicy::default());
        let mut med = make_med("Lisinopril");
        med.current_stock = 4.0;

        let alert = reminders.claim_low_stock(&med, t0()).unwrap();
        assert_eq!(alert.message, "Only 4 mg remaining.");
        assert!(reminders.claim_low_stock(&med, t0() + minutes(1)).is_none());

        // A dose taken changes the stock level: alert again.
        med.current_stock = 3.0;
        med.stock_changed_at = t0() + minutes(30);
        assert!(reminders.claim_low_stock(&med, t0() + minutes(31)).is_some());
    }

    #[test]
    fn a_live_low_stock_entry_survives_release() {
        let mut reminders = ReminderScheduler::new(&SafetyPolicy::default());
        let mut med = make_med("Lisinopril");
        med.current_stock = 2.0;
        let schedules = vec![MedicationSchedule::new(med.clone())];

        reminders.claim_low_stock(&med, t0()).unwrap();
        reminders.release(&schedules, t0() + Duration::days(1));
        assert!(reminders.claim_low_stock(&med, t0() + Duration::days(1)).is_none());

        // Deactivated (absent from the active set): released at once.
        reminders.release(&[], t0() + Duration::days(1));
        assert!(reminders.ledger().is_empty());
    }

    #[test]
    fn interaction_findings_are_alerted_when_first_seen() {
        let mut reminders = ReminderScheduler::new(&SafetyPolicy::default());
        assert!(reminders.needs_interaction_check("set-1"));

        let r = report(vec![finding("Warfarin", "Aspirin", Severity::Critical)], vec![]);
        let outcome = reminders.record_check(&r, "set-1");
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].severity, Severity::Critical);
        assert_eq!(outcome.critical.len(), 1);
        assert!(!reminders.needs_interaction_check("set-1"));
        assert!(reminders.needs_interaction_check("set-2"));

        // Same finding on a new set: no repeat alert.
        let outcome = reminders.record_check(&r, "set-2");
        assert!(outcome.alerts.is_empty());
    }

    /// An outage keeps the known critical finding and warns once per set.
    #[test]
    fn incomplete_check_warns_once_and_keeps_known_critical() {
        let mut reminders = ReminderScheduler::new(&SafetyPolicy::default());
        let pair = PairKey::new("warfarin", "aspirin");
        reminders.record_check(&report(vec![finding("Warfarin", "Aspirin", Severity::Critical)], vec![]), "set-1");

        let degraded = report(
            vec![],
            vec![PairFailure { pair, reason: "timed out after 5000ms".to_string() }],
        );
        let outcome = reminders.record_check(&degraded, "set-1");
        assert_eq!(outcome.critical.len(), 1);
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].title, "Interaction check incomplete");
        assert!(reminders.needs_interaction_check("set-1"));

        let outcome = reminders.record_check(&degraded, "set-1");
        assert!(outcome.alerts.is_empty());
        assert_eq!(outcome.critical.len(), 1);
    }

    #[test]
    fn amounts_render_without_spurious_decimals() {
        assert_eq!(format_amount(5.0, "ml"), "5 ml");
        assert_eq!(format_amount(2.5, "mg"), "2.50 mg");
    }
}
