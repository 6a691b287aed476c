//! The alert feed and derived safety status.
//!
//! Alerts are stamped with a monotonic `seq` and kept newest first. Only the
//! `read` flag ever changes after creation. Compliance and the traffic-light
//! status are derived on every read, never stored.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use pulseguard_contracts::{
    alert::{Alert, AlertDraft, AlertId, AlertType, SafetyStatus},
    error::{PulseGuardError, PulseGuardResult},
    interaction::InteractionFinding,
};

/// Read alerts retained beyond this many are dropped, oldest first.
/// Unread alerts are never dropped.
pub const READ_RETENTION: usize = 500;

/// Compliance points lost per unread missed-dose alert.
const MISSED_DOSE_PENALTY: u32 = 10;

/// A point-in-time view of the patient's safety state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySummary {
    pub status: SafetyStatus,
    pub compliance_percent: u32,
    pub unread_alerts: usize,
    pub unread_missed_doses: usize,
    pub critical_interactions: Vec<InteractionFinding>,
}

#[derive(Debug, Clone, Default)]
pub struct AlertAggregator {
    /// Newest first.
    feed: VecDeque<Alert>,
    next_seq: u64,
    critical: Vec<InteractionFinding>,
}

impl AlertAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `draft` and put it at the head of the feed.
    pub fn push(&mut self, draft: AlertDraft, now: DateTime<Utc>) -> Alert {
        self.next_seq += 1;
        let alert = Alert {
            id: AlertId::new(),
            seq: self.next_seq,
            alert_type: draft.alert_type,
            severity: draft.severity,
            title: draft.title,
            message: draft.message,
            medication_id: draft.medication_id,
            read: false,
            created_at: now,
        };
        info!(
            alert_id = %alert.id,
            seq = alert.seq,
            severity = %alert.severity,
            title = %alert.title,
            "alert created"
        );
        self.feed.push_front(alert.clone());
        self.prune();
        alert
    }

    fn prune(&mut self) {
        let read = self.feed.iter().filter(|a| a.read).count();
        if read <= READ_RETENTION {
            return;
        }
        let mut excess = read - READ_RETENTION;
        // Oldest entries sit at the back.
        let mut kept = VecDeque::with_capacity(self.feed.len() - excess);
        while let Some(alert) = self.feed.pop_back() {
            if alert.read && excess > 0 {
                excess -= 1;
                continue;
            }
            kept.push_front(alert);
        }
        self.feed = kept;
    }

    /// The most recent `limit` alerts, read or not.
    pub fn feed(&self, limit: usize) -> Vec<Alert> {
        self.feed.iter().take(limit).cloned().collect()
    }

    /// The most recent `limit` unread alerts.
    pub fn unread(&self, limit: usize) -> Vec<Alert> {
        self.feed.iter().filter(|a| !a.read).take(limit).cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.feed.iter().filter(|a| !a.read).count()
    }

    /// Unread alerts with `seq` greater than `after`, oldest first.
    pub fn unread_since(&self, after: u64) -> Vec<Alert> {
        self.feed
            .iter()
            .rev()
            .filter(|a| !a.read && a.seq > after)
            .cloned()
            .collect()
    }

    /// The highest `seq` assigned so far. Zero for an empty feed.
    pub fn latest_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn mark_read(&mut self, id: AlertId) -> PulseGuardResult<()> {
        let alert = self
            .feed
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| PulseGuardError::AlertNotFound { id: id.to_string() })?;
        alert.read = true;
        debug!(alert_id = %id, "alert marked read");
        Ok(())
    }

    /// Mark every unread alert with `seq <= watermark` as read.
    ///
    /// Alerts created after the caller took `watermark` are untouched.
    /// Returns how many alerts changed.
    pub fn mark_read_through(&mut self, watermark: u64) -> usize {
        let mut changed = 0;
        for alert in self.feed.iter_mut().filter(|a| !a.read && a.seq <= watermark) {
            alert.read = true;
            changed += 1;
        }
        if changed > 0 {
            info!(watermark, changed, "alerts marked read");
        }
        self.prune();
        changed
    }

    /// Mark every alert currently in the feed as read.
    pub fn mark_all_read(&mut self) -> usize {
        self.mark_read_through(self.next_seq)
    }

    /// Replace the set of unresolved critical interactions.
    pub fn set_critical_interactions(&mut self, findings: Vec<InteractionFinding>) {
        self.critical = findings.into_iter().filter(|f| f.is_critical()).collect();
    }

    pub fn critical_interactions(&self) -> &[InteractionFinding] {
        &self.critical
    }

    fn unread_missed_doses(&self) -> usize {
        self.feed
            .iter()
            .filter(|a| !a.read && a.alert_type == AlertType::MissedDose)
            .count()
    }

    /// `max(0, 100 - 10 x unread missed doses)`, and 0 while any critical
    /// interaction is unresolved.
    pub fn compliance_percent(&self) -> u32 {
        if !self.critical.is_empty() {
            return 0;
        }
        let missed = u32::try_from(self.unread_missed_doses()).unwrap_or(u32::MAX);
        100u32.saturating_sub(missed.saturating_mul(MISSED_DOSE_PENALTY))
    }

    pub fn status(&self) -> SafetyStatus {
        if !self.critical.is_empty() {
            return SafetyStatus::Red;
        }
        match self.compliance_percent() {
            p if p >= 80 => SafetyStatus::Green,
            p if p >= 60 => SafetyStatus::Yellow,
            _ => SafetyStatus::Red,
        }
    }

    pub fn summary(&self) -> SafetySummary {
        SafetySummary {
            status: self.status(),
            compliance_percent: self.compliance_percent(),
            unread_alerts: self.unread_count(),
            unread_missed_doses: self.unread_missed_doses(),
            critical_interactions: self.critical.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pulseguard_contracts::interaction::Severity;

    use super::*;

    fn draft(alert_type: AlertType, title: &str) -> AlertDraft {
        AlertDraft {
            alert_type,
            severity: Severity::Warning,
            title: title.to_string(),
            message: String::new(),
            medication_id: None,
        }
    }

    fn missed(feed: &mut AlertAggregator, n: usize) {
        for i in 0..n {
            feed.push(draft(AlertType::MissedDose, &format!("Missed Dose: {i}")), Utc::now());
        }
    }

    fn critical_finding() -> InteractionFinding {
        InteractionFinding {
            drug_a: "Warfarin".to_string(),
            drug_b: "Aspirin".to_string(),
            severity: Severity::Critical,
            description: "bleeding".to_string(),
            source: "mock".to_string(),
        }
    }

    #[test]
    fn feed_is_newest_first() {
        let mut feed = AlertAggregator::new();
        feed.push(draft(AlertType::LowStock, "first"), Utc::now());
        feed.push(draft(AlertType::LowStock, "second"), Utc::now());

        let titles: Vec<String> = feed.unread(10).into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(feed.unread(1).len(), 1);
    }

    #[test]
    fn compliance_and_status_thresholds() {
        let mut feed = AlertAggregator::new();
        assert_eq!(feed.compliance_percent(), 100);
        assert_eq!(feed.status(), SafetyStatus::Green);

        missed(&mut feed, 2);
        assert_eq!(feed.compliance_percent(), 80);
        assert_eq!(feed.status(), SafetyStatus::Green);

        missed(&mut feed, 1);
        assert_eq!(feed.compliance_percent(), 70);
        assert_eq!(feed.status(), SafetyStatus::Yellow);

        missed(&mut feed, 2);
        assert_eq!(feed.compliance_percent(), 50);
        assert_eq!(feed.status(), SafetyStatus::Red);

        missed(&mut feed, 10);
        assert_eq!(feed.compliance_percent(), 0);
    }

    /// Low stock alerts do not count against compliance.
    #[test]
    fn only_missed_doses_reduce_compliance() {
        let mut feed = AlertAggregator::new();
        feed.push(draft(AlertType::LowStock, "Low Stock: A"), Utc::now());
        assert_eq!(feed.compliance_percent(), 100);
    }

    #[test]
    fn critical_interaction_forces_red_and_zero() {
        let mut feed = AlertAggregator::new();
        feed.set_critical_interactions(vec![critical_finding()]);
        assert_eq!(feed.compliance_percent(), 0);
        assert_eq!(feed.status(), SafetyStatus::Red);

        feed.set_critical_interactions(vec![]);
        assert_eq!(feed.status(), SafetyStatus::Green);
    }

    #[test]
    fn reading_a_missed_dose_restores_compliance() {
        let mut feed = AlertAggregator::new();
        missed(&mut feed, 1);
        let id = feed.unread(1)[0].id;
        feed.mark_read(id).unwrap();
        assert_eq!(feed.compliance_percent(), 100);
        assert!(matches!(
            feed.mark_read(AlertId::new()),
            Err(PulseGuardError::AlertNotFound { .. })
        ));
    }

    /// Alerts created after the watermark was taken stay unread.
    #[test]
    fn mark_read_through_respects_the_snapshot() {
        let mut feed = AlertAggregator::new();
        missed(&mut feed, 3);
        let watermark = feed.latest_seq();
        missed(&mut feed, 1);

        assert_eq!(feed.mark_read_through(watermark), 3);
        let unread = feed.unread(10);
        assert_eq!(unread.len(), 1);
        assert!(unread[0].seq > watermark);

        assert_eq!(feed.mark_all_read(), 1);
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn unread_since_is_oldest_first() {
        let mut feed = AlertAggregator::new();
        missed(&mut feed, 3);
        let seqs: Vec<u64> = feed.unread_since(1).into_iter().map(|a| a.seq).collect();
        assert_eq!(seqs, vec![2, 3]);
    }

    #[test]
    fn read_alerts_beyond_retention_are_dropped() {
        let mut feed = AlertAggregator::new();
        missed(&mut feed, READ_RETENTION + 5);
        feed.mark_all_read();
        missed(&mut feed, 2);

        assert_eq!(feed.feed(usize::MAX).len(), READ_RETENTION + 2);
        assert_eq!(feed.unread_count(), 2);
    }
}
