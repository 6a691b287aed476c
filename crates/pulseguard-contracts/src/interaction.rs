//! Interaction findings and check reports.
//!
//! Findings are ephemeral: computed on demand, never persisted by this core.
//! A report always distinguishes "pair checked, nothing found" from "pair not
//! checked", so that a failed lookup can never read as a clean result.

use serde::{Deserialize, Serialize};

/// Severity tier shared by interaction findings and alerts.
///
/// Ordered so that `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    /// Critical or fatal. Blocks actions pending explicit acknowledgment.
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unordered, case-normalized pair of drug names.
///
/// `PairKey::new("Warfarin", "aspirin") == PairKey::new("aspirin", "WARFARIN")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(pub String, pub String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let a = normalize_name(a);
        let b = normalize_name(b);
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {}", self.0, self.1)
    }
}

/// Lowercase and trim a drug name for comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An interaction exactly as the lookup service reported it, before the
/// classifier has assigned a severity tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInteraction {
    pub drug_a: String,
    pub drug_b: String,
    /// Free-text label from the source (e.g. "high", "N/A", "moderate").
    pub severity_label: String,
    pub description: String,
    pub source: String,
}

/// A classified interaction between two drugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFinding {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: Severity,
    pub description: String,
    pub source: String,
}

impl InteractionFinding {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.drug_a, &self.drug_b)
    }

    /// Two findings with the same unordered pair and severity are duplicates.
    pub fn dedup_key(&self) -> (PairKey, Severity) {
        (self.pair_key(), self.severity)
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// A pair that could not be checked. Its absence of findings means "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFailure {
    pub pair: PairKey,
    pub reason: String,
}

/// The overall verdict of an interaction check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Every pair was checked and nothing was found.
    Clear,
    /// Every pair was checked and at least one finding exists.
    InteractionsFound,
    /// At least one pair could not be checked. Never to be shown as "no issues".
    Incomplete,
}

impl CheckStatus {
    /// Derive the verdict from the number of findings and failures.
    pub fn from_counts(findings: usize, failures: usize) -> Self {
        if failures > 0 {
            CheckStatus::Incomplete
        } else if findings > 0 {
            CheckStatus::InteractionsFound
        } else {
            CheckStatus::Clear
        }
    }
}
