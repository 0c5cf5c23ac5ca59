//! Drift findings and their severity/category vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Property path used for a finding that reports a missing resource.
pub const EXISTENCE_PROPERTY: &str = "<existence>";

/// Severity of a drift finding.
///
/// The derived order is ascending, so `Critical` compares greatest and
/// `max()` over findings yields the overall risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Cosmetic or low-impact drift.
    Low,
    /// Default severity for unclassified drift.
    Medium,
    /// Drift that degrades resilience, cost posture, or compliance.
    High,
    /// Drift that must be addressed immediately.
    Critical,
}

/// Category of a drift finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Security-relevant configuration.
    Security,
    /// Performance-relevant configuration.
    Performance,
    /// Cost-relevant configuration.
    Cost,
    /// Compliance-relevant configuration.
    Compliance,
    /// Everything else.
    Configuration,
}

/// Review lifecycle of a finding, owned by the downstream review workflow.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    /// Freshly detected, not yet reviewed.
    #[default]
    New,
    /// Seen by a reviewer.
    Acknowledged,
    /// Underlying drift has been fixed.
    Resolved,
    /// Deliberately left as-is.
    Ignored,
}

/// One detected mismatch between expected and observed state.
///
/// Findings are immutable after creation except for the review `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftFinding {
    /// Deterministic fingerprint, stable across re-runs of the same scan.
    pub id: String,
    /// Azure resource ID, or the expected name when the resource is absent.
    pub resource_id: String,
    /// Azure resource type.
    pub resource_type: String,
    /// Resource name.
    pub resource_name: String,
    /// Dotted property path, or [`EXISTENCE_PROPERTY`] for missing resources.
    pub property: String,
    /// Canonical rendering of the expected value.
    pub expected_value: String,
    /// Canonical rendering of the observed value, if any.
    pub actual_value: String,
    /// Classified severity.
    pub severity: Severity,
    /// Classified category.
    pub category: Category,
    /// Human-readable description of the drift.
    pub description: String,
    /// Suggested remediation.
    pub recommendation: String,
    /// Review status.
    #[serde(default)]
    pub status: FindingStatus,
    /// When the drift was detected.
    pub detected_at: DateTime<Utc>,
}

impl DriftFinding {
    /// Computes the deterministic finding ID for a scan/resource/property.
    ///
    /// The fingerprint makes batch persistence idempotent: re-saving the
    /// same scan's findings upserts instead of duplicating.
    #[must_use]
    pub fn fingerprint(scan_id: &str, resource_id: &str, property: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scan_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(resource_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(property.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }
}

impl Severity {
    /// Returns true if this severity demands action.
    #[must_use]
    pub fn requires_action(self) -> bool {
        self >= Self::High
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Cost => "cost",
            Self::Compliance => "compliance",
            Self::Configuration => "configuration",
        };
        write!(f, "{s}")
    }
}
