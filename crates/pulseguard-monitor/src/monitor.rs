//! `PatientMonitor`: the per-patient owner of all monitoring state.
//!
//! Dose schedules and reminder state live behind one async mutex. A dose log
//! holds it for the whole transaction (gate, persist, apply), and a tick
//! holds it while it reclassifies and persists missed doses, reads a
//! snapshot and records results, so the two never interleave. A tick's
//! interaction lookups and sink deliveries run outside the lock.
//!
//! Every store, lookup and sink call is bounded by a timeout. A timed-out
//! call is a failure, never an empty success.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pulseguard_contracts::{
    acknowledgment::{Acknowledgment, GuardedAction, OverrideRecord},
    alert::{Alert, AlertDraft, AlertId, AlertType, Notification},
    dose::{DoseEvent, DoseEventStatus, DueStatus},
    error::{PulseGuardError, PulseGuardResult},
    interaction::{CheckStatus, InteractionFinding, PairFailure, Severity},
    medication::{Medication, MedicationId, MedicationPatch, Monograph, NewMedication, PatientId},
};
use pulseguard_core::{
    concentration::{self, ConcentrationPoint},
    intake::{admit, validate_record},
    schedule::{DoseOutcome, DoseScheduler, MissedDose},
    traits::{DrugInfoService, InteractionLookup, MedicationStore, NotificationSink, OverrideWriter},
};
use pulseguard_interactions::{
    fingerprint::{active_set_fingerprint, fingerprint},
    CandidateCheck, CandidateDrug, InteractionMatrix, InteractionReport, SafetyGate,
};
use pulseguard_policy::SafetyPolicy;

use crate::{
    aggregator::{AlertAggregator, SafetySummary},
    reminder::ReminderScheduler,
};

/// The external services a monitor is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn MedicationStore>,
    pub lookup: Arc<dyn InteractionLookup>,
    pub drug_info: Arc<dyn DrugInfoService>,
    pub sink: Arc<dyn NotificationSink>,
    pub overrides: Arc<dyn OverrideWriter>,
}

/// Result of a successful `add_medication`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    pub medication: Medication,
    /// `Incomplete` means some pairs could not be checked; the add was not
    /// blocked by them, but the caller must say so.
    pub check_status: CheckStatus,
    pub warnings: Vec<InteractionFinding>,
    pub unavailable: Vec<PairFailure>,
    /// Present when the add proceeded past a critical interaction.
    pub override_record: Option<OverrideRecord>,
}

/// Result of a successful `log_dose`.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseLogOutcome {
    pub dose: DoseOutcome,
    /// The interaction check run before a `taken` log. `None` for `skipped`.
    pub check_status: Option<CheckStatus>,
    pub override_record: Option<OverrideRecord>,
}

/// What one scheduler tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub missed_doses: usize,
    pub alerts_created: usize,
    pub notifications_sent: usize,
    pub ledger_released: usize,
    /// Set when the tick re-checked interactions.
    pub interaction_check: Option<CheckStatus>,
}

struct MonitorState {
    doses: DoseScheduler,
    reminders: ReminderScheduler,
}

pub struct PatientMonitor {
    patient_id: PatientId,
    policy: SafetyPolicy,
    store: Arc<dyn MedicationStore>,
    drug_info: Arc<dyn DrugInfoService>,
    sink: Arc<dyn NotificationSink>,
    matrix: InteractionMatrix,
    gate: SafetyGate,
    state: tokio::sync::Mutex<MonitorState>,
    alerts: Mutex<AlertAggregator>,
    /// Highest alert `seq` already handed to the sink by the feed poll.
    delivered_through: AtomicU64,
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = PulseGuardResult<T>>,
    on_timeout: impl FnOnce() -> PulseGuardError,
) -> PulseGuardResult<T> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

fn store_timeout(operation: &str, limit: Duration) -> impl FnOnce() -> PulseGuardError + '_ {
    move || PulseGuardError::StoreFailed {
        reason: format!("{operation} timed out after {}ms", limit.as_millis()),
    }
}

impl PatientMonitor {
    /// Load the patient's medications from the store and start tracking them.
    pub async fn load(
        patient_id: PatientId,
        policy: SafetyPolicy,
        collaborators: Collaborators,
    ) -> PulseGuardResult<Self> {
        policy.validate()?;
        let limit = policy.store_timeout();
        let medications = bounded(
            limit,
            collaborators.store.list(&patient_id),
            store_timeout("list", limit),
        )
        .await?;

        let mut doses = DoseScheduler::new(policy.missed_dose_threshold());
        let defaults = policy.intake_defaults();
        for medication in medications {
            validate_record(&medication, &defaults)?;
            doses.track(medication);
        }
        info!(patient_id = %patient_id, medications = doses.active_medications().len(), "monitor loaded");

        Ok(Self {
            matrix: InteractionMatrix::new(collaborators.lookup, &policy),
            gate: SafetyGate::new(collaborators.overrides),
            state: tokio::sync::Mutex::new(MonitorState {
                doses,
                reminders: ReminderScheduler::new(&policy),
            }),
            alerts: Mutex::new(AlertAggregator::new()),
            delivered_through: AtomicU64::new(0),
            store: collaborators.store,
            drug_info: collaborators.drug_info,
            sink: collaborators.sink,
            patient_id,
            policy,
        })
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    fn alerts(&self) -> MutexGuard<'_, AlertAggregator> {
        // The aggregator holds no invariant a panic could break midway.
        self.alerts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_alert(&self, draft: AlertDraft, now: DateTime<Utc>) -> Alert {
        self.alerts().push(draft, now)
    }

    // ── Medication lifecycle ─────────────────────────────────────────────────

    /// Admit, check and persist a new medication.
    ///
    /// Fails with `BlockedByInteraction` when the candidate interacts
    /// critically with an active medication and no acknowledgment is given,
    /// and places a critical alert in the feed. The monograph is attached
    /// best-effort.
    pub async fn add_medication(
        &self,
        new: NewMedication,
        acknowledgment: Option<&Acknowledgment>,
        now: DateTime<Utc>,
    ) -> PulseGuardResult<AddOutcome> {
        let mut medication = admit(new, &self.policy.intake_defaults(), now)?;
        medication.monograph = self.fetch_monograph_best_effort(&medication.name).await;

        let mut state = self.state.lock().await;
        let active = state.doses.active_medications();
        let check = self
            .matrix
            .check_candidate(&CandidateDrug::from(&medication), &active, now)
            .await;

        let override_record = match self.authorize_add(&medication, &check, acknowledgment, now) {
            Ok(record) => record,
            Err(e) => {
                if let PulseGuardError::BlockedByInteraction { findings, .. } = &e {
                    self.push_alert(blocked_add_alert(&medication.name, findings), now);
                }
                return Err(e);
            }
        };

        let limit = self.policy.store_timeout();
        bounded(limit, self.store.create(&medication), store_timeout("create", limit)).await?;
        state.doses.track(medication.clone());
        drop(state);

        if !check.warnings.is_empty() {
            self.push_alert(add_warning_alert(&medication.name, &check.warnings), now);
        }

        info!(
            medication_id = %medication.id,
            name = %medication.name,
            check_status = ?check.status(),
            overridden = override_record.is_some(),
            "medication added"
        );
        Ok(AddOutcome {
            check_status: check.status(),
            warnings: check.warnings,
            unavailable: check.unavailable,
            override_record,
            medication,
        })
    }

    fn authorize_add(
        &self,
        medication: &Medication,
        check: &CandidateCheck,
        acknowledgment: Option<&Acknowledgment>,
        now: DateTime<Utc>,
    ) -> PulseGuardResult<Option<OverrideRecord>> {
        self.gate.authorize(
            GuardedAction::AddMedication { candidate: medication.name.clone() },
            &check.critical_interactions,
            &check.fingerprint,
            acknowledgment,
            now,
        )
    }

    async fn fetch_monograph_best_effort(&self, name: &str) -> Option<Monograph> {
        match self.monograph(name).await {
            Ok(monograph) => Some(monograph),
            Err(e) => {
                warn!(medication = %name, error = %e, "monograph unavailable, continuing without it");
                None
            }
        }
    }

    /// Stop monitoring a medication. Its record and history are kept.
    pub async fn deactivate(&self, id: MedicationId) -> PulseGuardResult<Medication> {
        let mut state = self.state.lock().await;
        state.doses.get(id)?;

        let patch = MedicationPatch { active: Some(false), ..MedicationPatch::default() };
        let limit = self.policy.store_timeout();
        bounded(limit, self.store.update(id, &patch), store_timeout("update", limit)).await?;
        state.doses.deactivate(id)
    }

    /// Replace the stock level of a medication.
    pub async fn adjust_stock(&self, id: MedicationId, stock: f64, now: DateTime<Utc>) -> PulseGuardResult<()> {
        if !stock.is_finite() || stock < 0.0 {
            return Err(PulseGuardError::InvalidScheduleConfig {
                reason: format!("current_stock must be non-negative, got {stock}"),
            });
        }
        let mut state = self.state.lock().await;
        state.doses.get(id)?;

        let patch = MedicationPatch {
            current_stock: Some(stock),
            stock_changed_at: Some(now),
            ..MedicationPatch::default()
        };
        let limit = self.policy.store_timeout();
        bounded(limit, self.store.update(id, &patch), store_timeout("update", limit)).await?;
        state.doses.adjust_stock(id, stock, now)
    }

    // ── Dose logging ─────────────────────────────────────────────────────────

    /// Log a dose as `taken` or `skipped` at `at`.
    ///
    /// A `taken` log is refused with `BlockedByInteraction` while a critical
    /// interaction exists among the active medications, unless a matching
    /// acknowledgment is given. The event, stock and next due time change as
    /// one transaction, after the store has accepted the log.
    pub async fn log_dose(
        &self,
        id: MedicationId,
        status: DoseEventStatus,
        at: DateTime<Utc>,
        acknowledgment: Option<&Acknowledgment>,
    ) -> PulseGuardResult<DoseLogOutcome> {
        let mut state = self.state.lock().await;
        let outcome = state.doses.preview_log(id, status, at)?;

        let mut check_status = None;
        let mut override_record = None;
        if status == DoseEventStatus::Taken {
            let name = state.doses.get(id)?.medication.name.clone();
            let active = state.doses.active_medications();
            let report = self.matrix.check_all(&active, at).await;
            let critical = report.critical();
            let ids: Vec<MedicationId> = active.iter().map(|m| m.id).collect();

            override_record = self.gate.authorize(
                GuardedAction::LogTaken { medication_id: id, medication_name: name.clone() },
                &critical,
                &fingerprint(&name, &ids, &critical),
                acknowledgment,
                at,
            )?;
            check_status = Some(report.status());
        }

        let limit = self.policy.store_timeout();
        bounded(limit, self.store.log_dose(id, status, at), store_timeout("log_dose", limit)).await?;
        state.doses.commit_log(id, &outcome)?;

        Ok(DoseLogOutcome { dose: outcome, check_status, override_record })
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub async fn status(&self, id: MedicationId, now: DateTime<Utc>) -> PulseGuardResult<DueStatus> {
        self.state.lock().await.doses.status(id, now)
    }

    pub async fn statuses(&self, now: DateTime<Utc>) -> Vec<DueStatus> {
        self.state.lock().await.doses.statuses(now)
    }

    pub async fn medications(&self) -> Vec<Medication> {
        self.state.lock().await.doses.active_medications()
    }

    pub async fn medication(&self, id: MedicationId) -> PulseGuardResult<Medication> {
        Ok(self.state.lock().await.doses.get(id)?.medication.clone())
    }

    /// Terminal dose events, newest first.
    pub async fn dose_history(&self, id: MedicationId) -> PulseGuardResult<Vec<DoseEvent>> {
        let state = self.state.lock().await;
        Ok(state.doses.get(id)?.history.iter().cloned().collect())
    }

    /// Display curve for one medication from `now` over `horizon_hours`.
    pub async fn concentration_curve(
        &self,
        id: MedicationId,
        now: DateTime<Utc>,
        horizon_hours: f64,
    ) -> PulseGuardResult<Vec<ConcentrationPoint>> {
        let schedule = self.state.lock().await.doses.get(id)?.dosing_schedule(now);
        concentration::curve(&schedule, now, horizon_hours)
    }

    /// Monograph text for display.
    pub async fn monograph(&self, name: &str) -> PulseGuardResult<Monograph> {
        let limit = self.policy.lookup_timeout();
        bounded(limit, self.drug_info.monograph(name), || PulseGuardError::LookupUnavailable {
            service: "drug info".to_string(),
            subject: name.to_string(),
            reason: format!("timed out after {}ms", limit.as_millis()),
        })
        .await
    }

    /// Every interaction the lookup service knows for `name`.
    pub async fn related_interactions(&self, name: &str) -> PulseGuardResult<Vec<InteractionFinding>> {
        self.matrix.related(name).await
    }

    /// Check a prospective medication against the active set without adding it.
    pub async fn check_candidate(&self, candidate: &CandidateDrug, now: DateTime<Utc>) -> CandidateCheck {
        let active = self.medications().await;
        self.matrix.check_candidate(candidate, &active, now).await
    }

    /// Check every pair of the active set now.
    pub async fn check_interactions(&self, now: DateTime<Utc>) -> InteractionReport {
        let active = self.medications().await;
        self.matrix.check_all(&active, now).await
    }

    // ── Alert feed ───────────────────────────────────────────────────────────

    /// Newest unread alerts, at most `feed_limit`.
    pub fn unread_alerts(&self) -> Vec<Alert> {
        self.alerts().unread(self.policy.reminders.feed_limit)
    }

    pub fn mark_alert_read(&self, id: AlertId) -> PulseGuardResult<()> {
        self.alerts().mark_read(id)
    }

    /// Mark unread alerts up to `watermark` (an alert `seq` the caller has
    /// seen) as read.
    pub fn mark_alerts_read_through(&self, watermark: u64) -> usize {
        self.alerts().mark_read_through(watermark)
    }

    pub fn mark_all_alerts_read(&self) -> usize {
        self.alerts().mark_all_read()
    }

    pub fn safety_summary(&self) -> SafetySummary {
        self.alerts().summary()
    }

    // ── Background work ──────────────────────────────────────────────────────

    /// One dose-timing pass over every active medication.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let mut drafts: Vec<AlertDraft> = Vec::new();

        let (notifications, active, active_fp, needs_check) = {
            let mut state = self.state.lock().await;
            let MonitorState { doses, reminders } = &mut *state;

            let missed = doses.reclassify_missed(now);
            report.missed_doses = missed.len();
            self.persist_missed(&missed).await;
            drafts.extend(missed.iter().filter_map(|m| reminders.claim_missed(m, now)));

            let snapshot = doses.snapshot();
            drafts.extend(snapshot.iter().filter_map(|s| reminders.claim_low_stock(&s.medication, now)));

            let notifications = reminders.evaluate_doses(&snapshot, now);
            report.ledger_released = reminders.release(&snapshot, now);

            let active = doses.active_medications();
            let ids: Vec<MedicationId> = active.iter().map(|m| m.id).collect();
            let active_fp = active_set_fingerprint(&ids);
            let needs_check = reminders.needs_interaction_check(&active_fp);
            (notifications, active, active_fp, needs_check)
        };

        if needs_check {
            let check = self.matrix.check_all(&active, now).await;
            report.interaction_check = Some(check.status());
            let outcome = self.state.lock().await.reminders.record_check(&check, &active_fp);
            self.alerts().set_critical_interactions(outcome.critical);
            drafts.extend(outcome.alerts);
        }

        report.alerts_created = drafts.len();
        {
            let mut alerts = self.alerts();
            for draft in drafts {
                alerts.push(draft, now);
            }
        }

        for notification in &notifications {
            self.deliver(notification).await;
        }
        report.notifications_sent = notifications.len();

        debug!(
            missed = report.missed_doses,
            alerts = report.alerts_created,
            notifications = report.notifications_sent,
            released = report.ledger_released,
            "scheduler tick complete"
        );
        report
    }

    /// Write missed doses to the store so a reload resumes after them.
    ///
    /// A failed write is logged; the in-memory reclassification stands.
    async fn persist_missed(&self, missed: &[MissedDose]) {
        let limit = self.policy.store_timeout();
        for m in missed {
            let write = self.store.log_dose(m.medication.id, DoseEventStatus::Missed, m.event.scheduled_time);
            if let Err(e) = bounded(limit, write, store_timeout("log_dose", limit)).await {
                warn!(
                    medication_id = %m.medication.id,
                    scheduled_time = %m.event.scheduled_time,
                    error = %e,
                    "missed dose not persisted"
                );
            }
        }
    }

    /// Hand every unread alert that appeared since the last poll to the sink.
    /// Returns how many were handed over.
    pub async fn poll_feed(&self) -> usize {
        let after = self.delivered_through.load(Ordering::Acquire);
        let fresh = self.alerts().unread_since(after);
        let Some(last) = fresh.last().map(|a| a.seq) else {
            return 0;
        };
        self.delivered_through.fetch_max(last, Ordering::AcqRel);

        for alert in &fresh {
            self.deliver(&Notification::from(alert)).await;
        }
        fresh.len()
    }

    /// Fire-and-forget delivery bounded by the delivery timeout.
    async fn deliver(&self, notification: &Notification) {
        let limit = self.policy.delivery_timeout();
        if timeout(limit, self.sink.emit(notification)).await.is_err() {
            warn!(title = %notification.title, "notification delivery timed out, dropped");
        }
    }
}

fn describe_pairs(findings: &[InteractionFinding]) -> String {
    findings
        .iter()
        .map(|f| format!("{}: {}", f.pair_key(), f.description))
        .collect::<Vec<_>>()
        .join("; ")
}

fn blocked_add_alert(name: &str, findings: &[InteractionFinding]) -> AlertDraft {
    AlertDraft {
        alert_type: AlertType::Interaction,
        severity: Severity::Critical,
        title: format!("CRITICAL: Cannot add {name}"),
        message: format!(
            "{name} has {} critical interaction(s) with your current medications. {}",
            findings.len(),
            describe_pairs(findings)
        ),
        medication_id: None,
    }
}

fn add_warning_alert(name: &str, warnings: &[InteractionFinding]) -> AlertDraft {
    AlertDraft {
        alert_type: AlertType::Interaction,
        severity: Severity::Warning,
        title: format!("Interaction Warning: {name}"),
        message: format!("{} interaction(s) found. {}", warnings.len(), describe_pairs(warnings)),
        medication_id: None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};

    use pulseguard_contracts::{
        alert::NotificationKind,
        interaction::{PairKey, RawInteraction},
        medication::{MedicationForm, Monograph},
    };

    use super::*;

    // ── Mock collaborators ───────────────────────────────────────────────────

    #[derive(Default)]
    struct MemStore {
        records: Mutex<HashMap<MedicationId, Medication>>,
        fail_writes: AtomicBool,
    }

    impl MemStore {
        fn record(&self, id: MedicationId) -> Medication {
            self.records.lock().unwrap()[&id].clone()
        }

        fn check_writable(&self) -> PulseGuardResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PulseGuardError::StoreFailed { reason: "disk full".to_string() });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MedicationStore for MemStore {
        async fn list(&self, patient_id: &PatientId) -> PulseGuardResult<Vec<Medication>> {
            let records = self.records.lock().unwrap();
            Ok(records.values().filter(|m| &m.patient_id == patient_id).cloned().collect())
        }

        async fn create(&self, medication: &Medication) -> PulseGuardResult<()> {
            self.check_writable()?;
            self.records.lock().unwrap().insert(medication.id, medication.clone());
            Ok(())
        }

        async fn update(&self, id: MedicationId, patch: &MedicationPatch) -> PulseGuardResult<()> {
            self.check_writable()?;
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&id)
                .ok_or_else(|| PulseGuardError::MedicationNotFound { id: id.to_string() })?;
            patch.apply_to(record);
            Ok(())
        }

        async fn log_dose(
            &self,
            medication_id: MedicationId,
            status: DoseEventStatus,
            time: DateTime<Utc>,
        ) -> PulseGuardResult<()> {
            self.check_writable()?;
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(&medication_id)
                .ok_or_else(|| PulseGuardError::MedicationNotFound { id: medication_id.to_string() })?;
            record.record_dose(status, time);
            Ok(())
        }
    }

    #[derive(Default)]
    struct TableLookup {
        table: Vec<RawInteraction>,
        down: AtomicBool,
        /// Per-call delay in milliseconds.
        stall_ms: AtomicU64,
    }

    #[async_trait]
    impl InteractionLookup for TableLookup {
        async fn lookup_pair(&self, a: &str, b: &str) -> PulseGuardResult<Vec<RawInteraction>> {
            let stall = self.stall_ms.load(Ordering::SeqCst);
            if stall > 0 {
                tokio::time::sleep(Duration::from_millis(stall)).await;
            }
            let key = PairKey::new(a, b);
            if self.down.load(Ordering::SeqCst) {
                return Err(PulseGuardError::LookupUnavailable {
                    service: "interaction".to_string(),
                    subject: key.to_string(),
                    reason: "503".to_string(),
                });
            }
            Ok(self
                .table
                .iter()
                .filter(|r| PairKey::new(&r.drug_a, &r.drug_b) == key)
                .cloned()
                .collect())
        }

        async fn lookup_for_name(&self, _name: &str) -> PulseGuardResult<Vec<RawInteraction>> {
            Ok(self.table.clone())
        }
    }

    /// Never answers within any reasonable timeout.
    struct HangingDrugInfo;

    #[async_trait]
    impl DrugInfoService for HangingDrugInfo {
        async fn monograph(&self, _name: &str) -> PulseGuardResult<Monograph> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Monograph::default())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        fn kinds(&self) -> Vec<NotificationKind> {
            self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn emit(&self, notification: &Notification) {
            self.sent.lock().unwrap().push(notification.clone());
        }
    }

    #[derive(Default)]
    struct VecWriter {
        records: Mutex<Vec<OverrideRecord>>,
    }

    impl OverrideWriter for VecWriter {
        fn write(&self, record: &OverrideRecord) -> PulseGuardResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    // ── Fixture ──────────────────────────────────────────────────────────────

    struct Fixture {
        monitor: PatientMonitor,
        store: Arc<MemStore>,
        lookup: Arc<TableLookup>,
        sink: Arc<RecordingSink>,
        overrides: Arc<VecWriter>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn raw(a: &str, b: &str, label: &str, description: &str) -> RawInteraction {
        RawInteraction {
            drug_a: a.to_string(),
            drug_b: b.to_string(),
            severity_label: label.to_string(),
            description: description.to_string(),
            source: "table".to_string(),
        }
    }

    fn table() -> Vec<RawInteraction> {
        vec![
            raw("Warfarin", "Aspirin", "high", "Increased risk of bleeding"),
            raw("Lisinopril", "Potassium", "moderate", "May raise serum potassium"),
        ]
    }

    fn patient() -> PatientId {
        PatientId("patient-1".to_string())
    }

    fn new_med(name: &str, stock: f64) -> NewMedication {
        NewMedication {
            patient_id: patient(),
            name: name.to_string(),
            form: MedicationForm::Pill,
            dose_amount: 2.0,
            dose_unit: None,
            frequency_hours: 24.0,
            half_life_hours: Some(6.0),
            current_stock: stock,
            stock_threshold: None,
        }
    }

    fn ack(fingerprint: &str) -> Acknowledgment {
        Acknowledgment {
            fingerprint: fingerprint.to_string(),
            acknowledged_by: "dr-lee".to_string(),
            reason: "monitored INR".to_string(),
        }
    }

    async fn fixture_with(store: Arc<MemStore>, lookup: Arc<TableLookup>) -> PulseGuardResult<Fixture> {
        let mut policy = SafetyPolicy::default();
        policy.lookup.timeout_ms = 50;
        let sink = Arc::new(RecordingSink::default());
        let overrides = Arc::new(VecWriter::default());
        let monitor = PatientMonitor::load(
            patient(),
            policy,
            Collaborators {
                store: store.clone(),
                lookup: lookup.clone(),
                drug_info: Arc::new(HangingDrugInfo),
                sink: sink.clone(),
                overrides: overrides.clone(),
            },
        )
        .await?;
        Ok(Fixture { monitor, store, lookup, sink, overrides })
    }

    async fn fixture() -> Fixture {
        let lookup = Arc::new(TableLookup { table: table(), ..TableLookup::default() });
        fixture_with(Arc::new(MemStore::default()), lookup).await.unwrap()
    }

    fn blocked_fingerprint<T: std::fmt::Debug>(result: PulseGuardResult<T>) -> String {
        match result {
            Err(PulseGuardError::BlockedByInteraction { fingerprint, .. }) => fingerprint,
            other => panic!("expected BlockedByInteraction, got {other:?}"),
        }
    }

    // ── add_medication ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn critical_candidate_is_blocked_until_acknowledged() {
        let f = fixture().await;
        f.monitor.add_medication(new_med("Warfarin", 30.0), None, t0()).await.unwrap();

        let blocked = f.monitor.add_medication(new_med("Aspirin", 30.0), None, t0()).await;
        let fp = blocked_fingerprint(blocked);
        assert_eq!(f.monitor.medications().await.len(), 1);
        assert_eq!(f.store.records.lock().unwrap().len(), 1);
        assert!(f
            .monitor
            .unread_alerts()
            .iter()
            .any(|a| a.title == "CRITICAL: Cannot add Aspirin" && a.severity == Severity::Critical));

        let added = f
            .monitor
            .add_medication(new_med("Aspirin", 30.0), Some(&ack(&fp)), t0())
            .await
            .unwrap();
        assert!(added.override_record.is_some());
        assert_eq!(f.overrides.records.lock().unwrap().len(), 1);
        assert_eq!(f.monitor.medications().await.len(), 2);
    }

    #[tokio::test]
    async fn stale_acknowledgment_is_rejected_and_not_recorded() {
        let f = fixture().await;
        f.monitor.add_medication(new_med("Warfarin", 30.0), None, t0()).await.unwrap();

        let result = f
            .monitor
            .add_medication(new_med("Aspirin", 30.0), Some(&ack("not-what-was-shown")), t0())
            .await;
        assert!(matches!(result, Err(PulseGuardError::StaleAcknowledgment { .. })));
        assert!(f.overrides.records.lock().unwrap().is_empty());
        assert_eq!(f.monitor.medications().await.len(), 1);
    }

    #[tokio::test]
    async fn warning_interaction_adds_with_a_feed_alert() {
        let f = fixture().await;
        f.monitor.add_medication(new_med("Lisinopril", 30.0), None, t0()).await.unwrap();
        let added = f.monitor.add_medication(new_med("Potassium", 30.0), None, t0()).await.unwrap();

        assert_eq!(added.check_status, CheckStatus::InteractionsFound);
        assert_eq!(added.warnings.len(), 1);
        assert!(added.override_record.is_none());
        assert_eq!(f.monitor.unread_alerts()[0].title, "Interaction Warning: Potassium");
    }

    /// A lookup outage never blocks and never reads as clear.
    #[tokio::test]
    async fn unavailable_lookup_adds_as_incomplete() {
        let f = fixture().await;
        f.lookup.down.store(true, Ordering::SeqCst);
        f.monitor.add_medication(new_med("Lisinopril", 30.0), None, t0()).await.unwrap();
        let added = f.monitor.add_medication(new_med("Potassium", 30.0), None, t0()).await.unwrap();

        assert_eq!(added.check_status, CheckStatus::Incomplete);
        assert!(added.warnings.is_empty());
        assert_eq!(added.unavailable.len(), 1);
    }

    #[tokio::test]
    async fn monograph_timeout_does_not_block_the_add() {
        let f = fixture().await;
        let added = f.monitor.add_medication(new_med("Metformin", 30.0), None, t0()).await.unwrap();
        assert!(added.medication.monograph.is_none());

        let direct = f.monitor.monograph("Metformin").await;
        assert!(matches!(direct, Err(PulseGuardError::LookupUnavailable { .. })));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_lookup() {
        let f = fixture().await;
        let mut bad = new_med("Metformin", 30.0);
        bad.half_life_hours = Some(0.0);
        let result = f.monitor.add_medication(bad, None, t0()).await;
        assert!(matches!(result, Err(PulseGuardError::InvalidScheduleConfig { .. })));
        assert!(f.store.records.lock().unwrap().is_empty());
    }

    // ── log_dose ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn taken_dose_is_persisted_and_advances_the_schedule() {
        let f = fixture().await;
        let med = f.monitor.add_medication(new_med("Metformin", 10.0), None, t0()).await.unwrap().medication;
        let at = t0() + ChronoDuration::hours(1);

        let logged = f.monitor.log_dose(med.id, DoseEventStatus::Taken, at, None).await.unwrap();
        assert_eq!(logged.dose.stock_after, 8.0);
        assert_eq!(logged.check_status, Some(CheckStatus::Clear));

        let stored = f.store.record(med.id);
        assert_eq!(stored.current_stock, 8.0);
        assert_eq!(stored.last_dose_time, Some(at));

        let status = f.monitor.status(med.id, at).await.unwrap();
        assert_eq!(status.next_dose_time, Some(at + ChronoDuration::hours(24)));
        assert_eq!(f.monitor.dose_history(med.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn taken_is_gated_but_skipped_is_not() {
        let f = fixture().await;
        let warfarin = f.monitor.add_medication(new_med("Warfarin", 30.0), None, t0()).await.unwrap().medication;
        let fp = blocked_fingerprint(f.monitor.add_medication(new_med("Aspirin", 30.0), None, t0()).await);
        f.monitor.add_medication(new_med("Aspirin", 30.0), Some(&ack(&fp)), t0()).await.unwrap();

        let at = t0() + ChronoDuration::minutes(5);
        let fp = blocked_fingerprint(f.monitor.log_dose(warfarin.id, DoseEventStatus::Taken, at, None).await);
        assert_eq!(f.store.record(warfarin.id).current_stock, 30.0);

        let skipped = f.monitor.log_dose(warfarin.id, DoseEventStatus::Skipped, at, None).await.unwrap();
        assert!(skipped.check_status.is_none());

        let later = at + ChronoDuration::hours(24);
        // The fingerprint covers the active set and findings, not the time.
        let taken = f
            .monitor
            .log_dose(warfarin.id, DoseEventStatus::Taken, later, Some(&ack(&fp)))
            .await
            .unwrap();
        assert!(taken.override_record.is_some());
        assert_eq!(f.store.record(warfarin.id).current_stock, 28.0);
    }

    #[tokio::test]
    async fn store_failure_leaves_the_schedule_untouched() {
        let f = fixture().await;
        let med = f.monitor.add_medication(new_med("Metformin", 10.0), None, t0()).await.unwrap().medication;
        f.store.fail_writes.store(true, Ordering::SeqCst);

        let result = f.monitor.log_dose(med.id, DoseEventStatus::Taken, t0(), None).await;
        assert!(matches!(result, Err(PulseGuardError::StoreFailed { .. })));
        assert!(f.monitor.dose_history(med.id).await.unwrap().is_empty());
        assert_eq!(f.monitor.medication(med.id).await.unwrap().current_stock, 10.0);
    }

    #[tokio::test]
    async fn unknown_medication_is_reported() {
        let f = fixture().await;
        let result = f.monitor.log_dose(MedicationId::new(), DoseEventStatus::Taken, t0(), None).await;
        assert!(matches!(result, Err(PulseGuardError::MedicationNotFound { .. })));
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn stored_invalid_schedule_fails_the_load() {
        let store = Arc::new(MemStore::default());
        let lookup = Arc::new(TableLookup::default());
        let f = fixture_with(store.clone(), lookup.clone()).await.unwrap();
        let med = f.monitor.add_medication(new_med("Metformin", 10.0), None, t0()).await.unwrap().medication;
        store.records.lock().unwrap().get_mut(&med.id).unwrap().half_life_hours = -1.0;

        let reloaded = fixture_with(store.clone(), lookup.clone()).await;
        assert!(matches!(reloaded, Err(PulseGuardError::InvalidScheduleConfig { .. })));

        // Frequencies that round to no time at all, or that fall below the
        // intake minimum, are rejected at load just as at intake.
        for frequency in [1e-8, 0.1, 1e12] {
            {
                let mut records = store.records.lock().unwrap();
                let record = records.get_mut(&med.id).unwrap();
                record.half_life_hours = 6.0;
                record.frequency_hours = frequency;
            }
            let reloaded = fixture_with(store.clone(), lookup.clone()).await;
            assert!(
                matches!(reloaded, Err(PulseGuardError::InvalidScheduleConfig { .. })),
                "frequency {frequency} must fail the load"
            );
        }
    }

    #[tokio::test]
    async fn missed_dose_is_not_realerted_after_reload() {
        let store = Arc::new(MemStore::default());
        let lookup = Arc::new(TableLookup::default());
        let f = fixture_with(store.clone(), lookup.clone()).await.unwrap();
        let med = f.monitor.add_medication(new_med("Metformin", 30.0), None, t0()).await.unwrap().medication;

        let tick = f.monitor.tick(t0() + ChronoDuration::minutes(61)).await;
        assert_eq!(tick.missed_doses, 1);
        assert_eq!(store.record(med.id).last_missed_time, Some(t0()));
        drop(f);

        let reloaded = fixture_with(store.clone(), lookup).await.unwrap();
        let status = reloaded.monitor.status(med.id, t0() + ChronoDuration::minutes(62)).await.unwrap();
        assert_eq!(status.next_dose_time, Some(t0() + ChronoDuration::hours(24)));

        let tick = reloaded.monitor.tick(t0() + ChronoDuration::minutes(62)).await;
        assert_eq!(tick.missed_doses, 0);
        assert!(!reloaded
            .monitor
            .unread_alerts()
            .iter()
            .any(|a| a.alert_type == AlertType::MissedDose));

        // A taken log clears the missed anchor in the store.
        let at = t0() + ChronoDuration::hours(24);
        reloaded.monitor.log_dose(med.id, DoseEventStatus::Taken, at, None).await.unwrap();
        let stored = store.record(med.id);
        assert_eq!(stored.last_missed_time, None);
        assert_eq!(stored.next_dose_time(), at + ChronoDuration::hours(24));
    }

    #[tokio::test]
    async fn deactivate_and_adjust_stock_reach_the_store() {
        let f = fixture().await;
        let med = f.monitor.add_medication(new_med("Metformin", 10.0), None, t0()).await.unwrap().medication;

        f.monitor.adjust_stock(med.id, 60.0, t0()).await.unwrap();
        assert_eq!(f.store.record(med.id).current_stock, 60.0);
        assert!(f.monitor.adjust_stock(med.id, -1.0, t0()).await.is_err());

        f.monitor.deactivate(med.id).await.unwrap();
        assert!(!f.store.record(med.id).active);
        assert!(f.monitor.medications().await.is_empty());
        assert_eq!(f.monitor.status(med.id, t0()).await.unwrap().next_dose_time, None);
    }

    #[tokio::test]
    async fn concentration_curve_covers_the_horizon() {
        let f = fixture().await;
        let med = f.monitor.add_medication(new_med("Metformin", 10.0), None, t0()).await.unwrap().medication;
        f.monitor.log_dose(med.id, DoseEventStatus::Taken, t0(), None).await.unwrap();

        let points = f.monitor.concentration_curve(med.id, t0(), 24.0).await.unwrap();
        assert_eq!(points.len(), 25);
    }

    // ── tick and poll_feed ───────────────────────────────────────────────────

    #[tokio::test]
    async fn dose_log_and_tick_do_not_interleave() {
        let lookup = Arc::new(TableLookup { table: table(), ..TableLookup::default() });
        let f = fixture_with(Arc::new(MemStore::default()), lookup.clone()).await.unwrap();
        let metformin = f.monitor.add_medication(new_med("Metformin", 10.0), None, t0()).await.unwrap().medication;
        f.monitor.add_medication(new_med("Lisinopril", 30.0), None, t0()).await.unwrap();

        // The log's interaction check stalls while holding the monitor lock;
        // the tick has to wait for the whole transaction.
        lookup.stall_ms.store(30, Ordering::SeqCst);
        let at = t0() + ChronoDuration::minutes(10);
        let (logged, tick) = tokio::join!(
            f.monitor.log_dose(metformin.id, DoseEventStatus::Taken, at, None),
            f.monitor.tick(at + ChronoDuration::minutes(1)),
        );
        let logged = logged.unwrap();
        assert_eq!(tick.missed_doses, 0);

        let next = at + ChronoDuration::hours(24);
        assert_eq!(logged.dose.next_pending.scheduled_time, next);
        let med = f.monitor.medication(metformin.id).await.unwrap();
        assert_eq!(med.current_stock, 8.0);
        assert_eq!(med.next_dose_time(), next);
        assert_eq!(f.store.record(metformin.id).current_stock, 8.0);
        assert_eq!(f.store.record(metformin.id).next_dose_time(), next);

        let status = f.monitor.status(metformin.id, at + ChronoDuration::minutes(1)).await.unwrap();
        assert_eq!(status.next_dose_time, Some(next));
        assert!(!status.is_overdue);

        // Only Lisinopril, still due at t0, was reminded.
        let reminded: Vec<Option<MedicationId>> =
            f.sink.sent.lock().unwrap().iter().map(|n| n.medication_id).collect();
        assert!(!reminded.contains(&Some(metformin.id)));
        assert!(!reminded.is_empty());
    }

    #[tokio::test]
    async fn reminders_fire_once_and_missed_doses_are_alerted() {
        let f = fixture().await;
        f.monitor.add_medication(new_med("Metformin", 30.0), None, t0()).await.unwrap();

        let first = f.monitor.tick(t0() + ChronoDuration::minutes(1)).await;
        assert_eq!(first.notifications_sent, 1);
        assert_eq!(first.interaction_check, Some(CheckStatus::Clear));
        assert_eq!(f.sink.kinds(), vec![NotificationKind::DoseOverdue]);

        let second = f.monitor.tick(t0() + ChronoDuration::minutes(2)).await;
        assert_eq!(second.notifications_sent, 0);
        assert_eq!(second.interaction_check, None);

        let third = f.monitor.tick(t0() + ChronoDuration::minutes(61)).await;
        assert_eq!(third.missed_doses, 1);
        assert_eq!(third.alerts_created, 1);
        assert_eq!(f.monitor.unread_alerts()[0].title, "Missed Dose: Metformin");
        assert_eq!(f.monitor.safety_summary().compliance_percent, 90);
    }

    #[tokio::test]
    async fn low_stock_is_alerted_once_per_stock_change() {
        let f = fixture().await;
        let med = f.monitor.add_medication(new_med("Metformin", 3.0), None, t0()).await.unwrap().medication;

        f.monitor.tick(t0()).await;
        f.monitor.tick(t0() + ChronoDuration::minutes(1)).await;
        let low: Vec<Alert> = f
            .monitor
            .unread_alerts()
            .into_iter()
            .filter(|a| a.alert_type == AlertType::LowStock)
            .collect();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].title, "Low Stock: Metformin");

        f.monitor.adjust_stock(med.id, 2.0, t0() + ChronoDuration::minutes(2)).await.unwrap();
        f.monitor.tick(t0() + ChronoDuration::minutes(3)).await;
        let low = f
            .monitor
            .unread_alerts()
            .into_iter()
            .filter(|a| a.alert_type == AlertType::LowStock)
            .count();
        assert_eq!(low, 2);
    }

    #[tokio::test]
    async fn background_check_drives_the_safety_status() {
        let f = fixture().await;
        f.monitor.add_medication(new_med("Warfarin", 30.0), None, t0()).await.unwrap();
        let fp = blocked_fingerprint(f.monitor.add_medication(new_med("Aspirin", 30.0), None, t0()).await);
        let aspirin = f
            .monitor
            .add_medication(new_med("Aspirin", 30.0), Some(&ack(&fp)), t0())
            .await
            .unwrap()
            .medication;

        let report = f.monitor.tick(t0() + ChronoDuration::minutes(1)).await;
        assert_eq!(report.interaction_check, Some(CheckStatus::InteractionsFound));
        let summary = f.monitor.safety_summary();
        assert_eq!(summary.status, pulseguard_contracts::alert::SafetyStatus::Red);
        assert_eq!(summary.compliance_percent, 0);
        assert!(f
            .monitor
            .unread_alerts()
            .iter()
            .any(|a| a.title.starts_with("Critical Interaction:")));

        f.monitor.deactivate(aspirin.id).await.unwrap();
        f.monitor.tick(t0() + ChronoDuration::minutes(2)).await;
        assert_eq!(f.monitor.safety_summary().status, pulseguard_contracts::alert::SafetyStatus::Green);
    }

    #[tokio::test]
    async fn feed_poll_delivers_each_alert_once() {
        let f = fixture().await;
        f.monitor.add_medication(new_med("Warfarin", 30.0), None, t0()).await.unwrap();
        let _ = f.monitor.add_medication(new_med("Aspirin", 30.0), None, t0()).await;

        assert_eq!(f.monitor.poll_feed().await, 1);
        assert_eq!(f.monitor.poll_feed().await, 0);
        assert_eq!(f.sink.kinds(), vec![NotificationKind::FeedAlert]);

        let watermark = f.monitor.unread_alerts()[0].seq;
        assert_eq!(f.monitor.mark_alerts_read_through(watermark), 1);
        assert!(f.monitor.unread_alerts().is_empty());
    }
}
