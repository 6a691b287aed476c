//! Pairwise interaction checking.
//!
//! `InteractionMatrix` queries the Interaction Lookup Service once per
//! unordered pair of drug names, fanning the queries out under a bounded
//! `Semaphore` with a per-call timeout, then classifies and deduplicates the
//! merged results.
//!
//! A pair whose query fails or times out is reported in `unavailable`. It
//! never contributes an empty "safe" result: any unavailable pair makes the
//! overall status `Incomplete`.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

use pulseguard_contracts::{
    error::{PulseGuardError, PulseGuardResult},
    interaction::{
        normalize_name, CheckStatus, InteractionFinding, PairFailure, PairKey, RawInteraction,
        Severity,
    },
    medication::{Medication, MedicationId},
};
use pulseguard_core::traits::InteractionLookup;
use pulseguard_policy::{SafetyPolicy, SeverityClassifier};

use crate::{
    fingerprint::fingerprint,
    overlap::{overlap_finding, ActiveDrug, ActiveWindow},
};

/// The drug being considered for addition.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDrug {
    pub name: String,
    /// Enables the pharmacokinetic overlap check when known.
    pub half_life_hours: Option<f64>,
}

impl CandidateDrug {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), half_life_hours: None }
    }
}

impl From<&Medication> for CandidateDrug {
    fn from(medication: &Medication) -> Self {
        Self {
            name: medication.name.clone(),
            half_life_hours: Some(medication.half_life_hours),
        }
    }
}

/// The result of checking every pair of an active set.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionReport {
    /// Deduplicated findings, most severe first.
    pub findings: Vec<InteractionFinding>,
    /// Pairs whose lookup failed. Their findings are unknown.
    pub unavailable: Vec<PairFailure>,
    /// Pairs queried successfully.
    pub pairs_checked: usize,
    /// Fingerprint of the active set and its critical findings.
    pub fingerprint: String,
}

impl InteractionReport {
    pub fn status(&self) -> CheckStatus {
        CheckStatus::from_counts(self.findings.len(), self.unavailable.len())
    }

    pub fn critical(&self) -> Vec<InteractionFinding> {
        self.findings.iter().filter(|f| f.is_critical()).cloned().collect()
    }

    pub fn has_critical(&self) -> bool {
        self.findings.iter().any(InteractionFinding::is_critical)
    }
}

/// The result of checking one candidate against an active set.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCheck {
    pub candidate: String,
    pub critical_interactions: Vec<InteractionFinding>,
    /// Every non-critical finding. Informational, never blocking.
    pub warnings: Vec<InteractionFinding>,
    pub unavailable: Vec<PairFailure>,
    /// Binds an acknowledgment to this candidate, set and findings.
    pub fingerprint: String,
}

impl CandidateCheck {
    pub fn status(&self) -> CheckStatus {
        CheckStatus::from_counts(
            self.critical_interactions.len() + self.warnings.len(),
            self.unavailable.len(),
        )
    }

    pub fn is_blocking(&self) -> bool {
        !self.critical_interactions.is_empty()
    }
}

/// Outcome of fanning out a set of pair queries.
struct PairResults {
    raw: Vec<RawInteraction>,
    failures: Vec<PairFailure>,
    succeeded: usize,
}

/// Pairwise interaction checker over an opaque lookup service.
#[derive(Clone)]
pub struct InteractionMatrix {
    lookup: Arc<dyn InteractionLookup>,
    classifier: SeverityClassifier,
    max_concurrency: usize,
    call_timeout: Duration,
    clearance_half_lives: f64,
}

impl InteractionMatrix {
    pub fn new(lookup: Arc<dyn InteractionLookup>, policy: &SafetyPolicy) -> Self {
        Self {
            lookup,
            classifier: SeverityClassifier::new(&policy.classification),
            max_concurrency: policy.lookup.max_concurrency.max(1),
            call_timeout: policy.lookup_timeout(),
            clearance_half_lives: policy.classification.clearance_half_lives,
        }
    }

    pub fn classifier(&self) -> &SeverityClassifier {
        &self.classifier
    }

    /// Check every unordered pair among `active`.
    ///
    /// Each distinct pair of names is queried exactly once. Two medications
    /// sharing a name are not paired.
    pub async fn check_all(&self, active: &[Medication], now: DateTime<Utc>) -> InteractionReport {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut seen: HashSet<PairKey> = HashSet::new();
        let mut local: Vec<InteractionFinding> = Vec::new();

        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                if normalize_name(&a.name) == normalize_name(&b.name) {
                    continue;
                }
                if seen.insert(PairKey::new(&a.name, &b.name)) {
                    pairs.push((a.name.clone(), b.name.clone()));
                }
                if let Some(finding) = self.overlap_between(a, b, now) {
                    local.push(finding);
                }
            }
        }

        let results = self.query_pairs(pairs).await;
        let findings = self.merge(&results.raw, local);
        let ids: Vec<MedicationId> = active.iter().map(|m| m.id).collect();
        let critical: Vec<InteractionFinding> =
            findings.iter().filter(|f| f.is_critical()).cloned().collect();

        let report = InteractionReport {
            fingerprint: fingerprint("", &ids, &critical),
            findings,
            unavailable: results.failures,
            pairs_checked: results.succeeded,
        };
        info!(
            medications = active.len(),
            pairs_checked = report.pairs_checked,
            unavailable = report.unavailable.len(),
            findings = report.findings.len(),
            critical = critical.len(),
            "interaction check complete"
        );
        report
    }

    /// Check `candidate` against every medication in `active`.
    ///
    /// The candidate's own window, for the overlap check, starts at `now`.
    pub async fn check_candidate(
        &self,
        candidate: &CandidateDrug,
        active: &[Medication],
        now: DateTime<Utc>,
    ) -> CandidateCheck {
        let candidate_key = normalize_name(&candidate.name);
        let candidate_window = candidate
            .half_life_hours
            .and_then(|h| ActiveWindow::from_dose(now, h, self.clearance_half_lives));

        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut local: Vec<InteractionFinding> = Vec::new();

        for medication in active {
            let key = normalize_name(&medication.name);
            if key == candidate_key {
                continue;
            }
            if seen.insert(key) {
                pairs.push((candidate.name.clone(), medication.name.clone()));
            }
            let other = ActiveWindow::for_medication(medication, self.clearance_half_lives);
            if let (Some(mine), Some(theirs)) = (candidate_window, other) {
                let found = overlap_finding(
                    &self.classifier,
                    ActiveDrug { name: &candidate.name, window: mine },
                    ActiveDrug { name: &medication.name, window: theirs },
                    now,
                );
                local.extend(found);
            }
        }

        let results = self.query_pairs(pairs).await;
        let findings = self.merge(&results.raw, local);
        let (critical, warnings): (Vec<_>, Vec<_>) =
            findings.into_iter().partition(InteractionFinding::is_critical);

        let ids: Vec<MedicationId> = active.iter().map(|m| m.id).collect();
        let check = CandidateCheck {
            fingerprint: fingerprint(&candidate.name, &ids, &critical),
            candidate: candidate.name.clone(),
            critical_interactions: critical,
            warnings,
            unavailable: results.failures,
        };
        info!(
            candidate = %check.candidate,
            critical = check.critical_interactions.len(),
            warnings = check.warnings.len(),
            unavailable = check.unavailable.len(),
            "candidate interaction check complete"
        );
        check
    }

    /// Every classified interaction the service knows for `drug_name`.
    ///
    /// Unlike the pair checks this is a single call, so a failure is the
    /// call's error.
    pub async fn related(&self, drug_name: &str) -> PulseGuardResult<Vec<InteractionFinding>> {
        let raw = match timeout(self.call_timeout, self.lookup.lookup_for_name(drug_name)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(PulseGuardError::LookupUnavailable {
                    service: "interaction".to_string(),
                    subject: drug_name.to_string(),
                    reason: format!("timed out after {}ms", self.call_timeout.as_millis()),
                })
            }
        };
        Ok(self.merge(&raw, Vec::new()))
    }

    fn overlap_between(&self, a: &Medication, b: &Medication, now: DateTime<Utc>) -> Option<InteractionFinding> {
        let wa = ActiveWindow::for_medication(a, self.clearance_half_lives)?;
        let wb = ActiveWindow::for_medication(b, self.clearance_half_lives)?;
        overlap_finding(
            &self.classifier,
            ActiveDrug { name: &a.name, window: wa },
            ActiveDrug { name: &b.name, window: wb },
            now,
        )
    }

    /// Classify `raw`, add `local` findings, and drop (pair, severity)
    /// duplicates. The first occurrence of each key wins.
    fn merge(&self, raw: &[RawInteraction], local: Vec<InteractionFinding>) -> Vec<InteractionFinding> {
        let mut keys: HashSet<(PairKey, Severity)> = HashSet::new();
        let mut findings: Vec<InteractionFinding> = raw
            .iter()
            .map(|r| self.classifier.classify(r))
            .chain(local)
            .filter(|f| keys.insert(f.dedup_key()))
            .collect();

        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.pair_key().cmp(&b.pair_key()))
        });
        findings
    }

    /// Query every pair concurrently, at most `max_concurrency` at a time.
    async fn query_pairs(&self, pairs: Vec<(String, String)>) -> PairResults {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut outstanding: BTreeSet<PairKey> = BTreeSet::new();

        for (a, b) in pairs {
            let key = PairKey::new(&a, &b);
            outstanding.insert(key.clone());

            let lookup = Arc::clone(&self.lookup);
            let semaphore = Arc::clone(&semaphore);
            let limit = self.call_timeout;

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => match timeout(limit, lookup.lookup_pair(&a, &b)).await {
                        Ok(Ok(raw)) => Ok(raw),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
                    },
                    Err(_) => Err("lookup pool closed".to_string()),
                };
                (key, outcome)
            });
        }

        let mut results = PairResults { raw: Vec::new(), failures: Vec::new(), succeeded: 0 };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(raw))) => {
                    debug!(pair = %key, results = raw.len(), "pair checked");
                    outstanding.remove(&key);
                    results.succeeded += 1;
                    results.raw.extend(raw);
                }
                Ok((key, Err(reason))) => {
                    warn!(pair = %key, reason = %reason, "interaction lookup unavailable");
                    outstanding.remove(&key);
                    results.failures.push(PairFailure { pair: key, reason });
                }
                Err(e) => warn!(error = %e, "interaction lookup task failed"),
            }
        }

        // A task that panicked never reported its pair.
        for key in outstanding {
            results.failures.push(PairFailure { pair: key, reason: "lookup task failed".to_string() });
        }
        results.failures.sort_by(|a, b| a.pair.cmp(&b.pair));
        results
    }
}
