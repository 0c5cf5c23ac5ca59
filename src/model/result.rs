//! In-memory analysis aggregate for one pipeline scan.

use serde::Serialize;

use super::finding::{DriftFinding, Severity};

/// Aggregated outcome of diffing one pipeline's resources.
///
/// This is an in-memory aggregate; only its findings and the scan log are
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DriftAnalysisResult {
    /// One-line summary of the analysis.
    pub summary: String,
    /// Ordered findings (stable by resource, then property path).
    pub findings: Vec<DriftFinding>,
    /// Maximum severity present, `None` when no drift was found.
    pub overall_risk: Option<Severity>,
    /// True when the overall risk is High or Critical.
    pub action_required: bool,
    /// Number of expected resources scanned.
    pub resources_scanned: usize,
}

impl DriftAnalysisResult {
    /// Builds the aggregate from the ordered findings of one scan.
    #[must_use]
    pub fn from_findings(findings: Vec<DriftFinding>, resources_scanned: usize) -> Self {
        let overall_risk = findings.iter().map(|f| f.severity).max();
        let action_required = overall_risk.is_some_and(Severity::requires_action);

        let summary = if findings.is_empty() {
            format!("No drift detected across {resources_scanned} resources")
        } else {
            format!(
                "{} drift finding(s) across {} resources, overall risk {}",
                findings.len(),
                resources_scanned,
                overall_risk.map_or_else(|| String::from("none"), |s| s.to_string()),
            )
        };

        Self {
            summary,
            findings,
            overall_risk,
            action_required,
            resources_scanned,
        }
    }

    /// Returns true if any drift was found.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Counts findings at the given severity.
    #[must_use]
    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

impl std::fmt::Display for DriftAnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.summary)?;
        for finding in &self.findings {
            writeln!(
                f,
                "  [{}] {} {}: expected {:?}, actual {:?}",
                finding.severity,
                finding.resource_name,
                finding.property,
                finding.expected_value,
                finding.actual_value,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::finding::Category;
    use chrono::Utc;

    fn finding(severity: Severity) -> DriftFinding {
        DriftFinding {
            id: DriftFinding::fingerprint("scan-1", "res-1", "sku"),
            resource_id: String::from("res-1"),
            resource_type: String::from("Microsoft.Storage/storageAccounts"),
            resource_name: String::from("stprod01"),
            property: String::from("sku"),
            expected_value: String::from("Standard_GRS"),
            actual_value: String::from("Standard_LRS"),
            severity,
            category: Category::Cost,
            description: String::from("Storage redundancy drift"),
            recommendation: String::from("Restore the declared SKU"),
            status: crate::model::FindingStatus::New,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_findings_mean_no_risk() {
        let result = DriftAnalysisResult::from_findings(vec![], 7);

        assert!(!result.has_drift());
        assert_eq!(result.overall_risk, None);
        assert!(!result.action_required);
        assert!(result.summary.contains("No drift"));
    }

    #[test]
    fn test_overall_risk_is_max_severity() {
        let result = DriftAnalysisResult::from_findings(
            vec![finding(Severity::Low), finding(Severity::High), finding(Severity::Medium)],
            3,
        );

        assert_eq!(result.overall_risk, Some(Severity::High));
        assert!(result.action_required);
        assert_eq!(result.count_at(Severity::Low), 1);
    }

    #[test]
    fn test_medium_risk_requires_no_action() {
        let result = DriftAnalysisResult::from_findings(vec![finding(Severity::Medium)], 1);

        assert_eq!(result.overall_risk, Some(Severity::Medium));
        assert!(!result.action_required);
    }
}
