//! Severity classification of raw interaction results.
//!
//! `SeverityClassifier` turns a `RawInteraction` (free-text label and
//! description, as the lookup service reported it) into an
//! `InteractionFinding` with one of three tiers.
//!
//! Classification algorithm:
//!
//! 1. `Critical` if any of:
//!    a. the label is one of `critical_labels`;
//!    b. the label or description contains a `critical_keywords` fragment;
//!    c. the two drug names match a `critical_combos` entry in either order.
//! 2. Otherwise `Info` if the label is one of `info_labels`.
//! 3. Otherwise `Warning`. Unknown labels never downgrade to `Info`.

use tracing::debug;

use pulseguard_contracts::interaction::{
    normalize_name, InteractionFinding, RawInteraction, Severity,
};

use crate::rule::ClassificationPolicy;

/// Classifies raw lookup results against a `ClassificationPolicy`.
///
/// All policy strings are normalized (trimmed, lowercased) once at
/// construction.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    critical_labels: Vec<String>,
    info_labels: Vec<String>,
    critical_keywords: Vec<String>,
    critical_combos: Vec<(String, String)>,
}

impl SeverityClassifier {
    pub fn new(policy: &ClassificationPolicy) -> Self {
        let norm = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| normalize_name(s))
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            critical_labels: norm(&policy.critical_labels),
            info_labels: norm(&policy.info_labels),
            critical_keywords: norm(&policy.critical_keywords),
            critical_combos: policy
                .critical_combos
                .iter()
                .map(|[a, b]| (normalize_name(a), normalize_name(b)))
                .filter(|(a, b)| !a.is_empty() && !b.is_empty())
                .collect(),
        }
    }

    /// Assign a severity tier to `raw`.
    pub fn classify(&self, raw: &RawInteraction) -> InteractionFinding {
        let severity = self.severity_of(raw);
        debug!(
            drug_a = %raw.drug_a,
            drug_b = %raw.drug_b,
            label = %raw.severity_label,
            severity = %severity,
            "interaction classified"
        );
        InteractionFinding {
            drug_a: raw.drug_a.clone(),
            drug_b: raw.drug_b.clone(),
            severity,
            description: raw.description.clone(),
            source: raw.source.clone(),
        }
    }

    fn severity_of(&self, raw: &RawInteraction) -> Severity {
        let label = normalize_name(&raw.severity_label);
        let description = raw.description.to_lowercase();

        if self.critical_labels.iter().any(|l| *l == label)
            || self
                .critical_keywords
                .iter()
                .any(|kw| label.contains(kw.as_str()) || description.contains(kw.as_str()))
            || self.is_critical_combo(&raw.drug_a, &raw.drug_b)
        {
            return Severity::Critical;
        }

        if self.info_labels.iter().any(|l| *l == label) {
            Severity::Info
        } else {
            Severity::Warning
        }
    }

    /// True when the two names match a known critical combination.
    ///
    /// Matching is by fragment: `("warfarin", "nsaid")` matches
    /// "Warfarin Sodium" with "NSAID (ibuprofen)".
    pub fn is_critical_combo(&self, drug_a: &str, drug_b: &str) -> bool {
        self.matching_combo(drug_a, drug_b).is_some()
    }

    /// The first critical combination matching the two names, if any.
    pub fn matching_combo(&self, drug_a: &str, drug_b: &str) -> Option<(&str, &str)> {
        let a = normalize_name(drug_a);
        let b = normalize_name(drug_b);
        self.critical_combos
            .iter()
            .find(|(x, y)| {
                (a.contains(x.as_str()) && b.contains(y.as_str()))
                    || (a.contains(y.as_str()) && b.contains(x.as_str()))
            })
            .map(|(x, y)| (x.as_str(), y.as_str()))
    }
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new(&ClassificationPolicy::default())
    }
}
