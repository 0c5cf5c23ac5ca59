//! Output formatting for CLI commands.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::engine::Classifier;
use crate::model::{DriftAnalysisResult, Severity};
use crate::orchestrator::PipelineScanOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI results.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Finding row for table display.
#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Category")]
    category: String,
}

/// Scan outcome row for table display.
#[derive(Tabled)]
struct ScanRow {
    #[tabled(rename = "Pipeline")]
    pipeline: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Drift")]
    drift: usize,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats one pipeline's analysis result.
    #[must_use]
    pub fn format_result(&self, result: &DriftAnalysisResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => Self::format_result_text(result),
        }
    }

    /// Formats a result as text.
    fn format_result_text(result: &DriftAnalysisResult) -> String {
        if !result.has_drift() {
            return format!(
                "{} No drift detected across {} resources.\n",
                "✓".green(),
                result.resources_scanned
            );
        }

        let mut output = String::new();
        let _ = writeln!(output, "\n{} {}\n", "⚠".yellow(), result.summary);

        let rows: Vec<FindingRow> = result
            .findings
            .iter()
            .map(|f| FindingRow {
                severity: Self::format_severity(f.severity),
                resource: Self::truncate(&f.resource_name, 24),
                property: Self::truncate(&f.property, 32),
                expected: Self::truncate(&f.expected_value, 24),
                actual: Self::truncate(&f.actual_value, 24),
                category: f.category.to_string(),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nFindings: {} critical, {} high, {} medium, {} low, {} info\n",
            result.count_at(Severity::Critical).to_string().red(),
            result.count_at(Severity::High).to_string().red(),
            result.count_at(Severity::Medium).to_string().yellow(),
            result.count_at(Severity::Low),
            result.count_at(Severity::Info),
        );
        if result.action_required {
            let _ = writeln!(output, "{} Action required.", "⚠".red());
        }

        output
    }

    /// Formats the per-pipeline outcomes of one request.
    #[must_use]
    pub fn format_outcomes(&self, scans: &[PipelineScanOutcome]) -> String {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<ScanJson> = scans.iter().map(ScanJson::from).collect();
                serde_json::to_string_pretty(&rows).unwrap_or_default()
            }
            OutputFormat::Text => {
                if scans.is_empty() {
                    return String::from("No pipelines analyzed.\n");
                }

                let rows: Vec<ScanRow> = scans
                    .iter()
                    .map(|s| ScanRow {
                        pipeline: s.pipeline_id.clone(),
                        status: s.status.to_string(),
                        drift: s.drift_count,
                        detail: s
                            .error
                            .clone()
                            .or_else(|| s.result.as_ref().map(|r| r.summary.clone()))
                            .unwrap_or_default(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a rule table overview.
    #[must_use]
    pub fn format_rules(&self, classifier: &Classifier) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "version": classifier.version(),
                    "resource_types": classifier.resource_type_count(),
                    "property_rules": classifier.property_rule_count(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "Rule table version: {}", classifier.version());
                let _ = writeln!(
                    output,
                    "Resource types covered: {}",
                    classifier.resource_type_count()
                );
                let _ = writeln!(
                    output,
                    "Property rules: {}",
                    classifier.property_rule_count()
                );
                output
            }
        }
    }

    /// Formats a severity with color.
    fn format_severity(severity: Severity) -> String {
        match severity {
            Severity::Critical => "critical".red().bold().to_string(),
            Severity::High => "high".red().to_string(),
            Severity::Medium => "medium".yellow().to_string(),
            Severity::Low => "low".to_string(),
            Severity::Info => "info".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum byte length for table display.
    ///
    /// The cut is floored to a char boundary so multi-byte names (for
    /// example Azure resources tagged in non-Latin scripts) never split
    /// mid-character.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            return s.to_string();
        }
        let mut cut = max_len.saturating_sub(3);
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &s[..cut])
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct ScanJson {
    pipeline_id: String,
    scan_id: Option<String>,
    status: String,
    drift_count: usize,
    error: Option<String>,
}

impl From<&PipelineScanOutcome> for ScanJson {
    fn from(scan: &PipelineScanOutcome) -> Self {
        Self {
            pipeline_id: scan.pipeline_id.clone(),
            scan_id: scan.scan_id.clone(),
            status: scan.status.to_string(),
            drift_count: scan.drift_count,
            error: scan.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, DriftFinding, FindingStatus};
    use chrono::Utc;

    fn result_with_one_finding() -> DriftAnalysisResult {
        let finding = DriftFinding {
            id: DriftFinding::fingerprint("scan-1", "res-1", "sku"),
            resource_id: String::from("res-1"),
            resource_type: String::from("Microsoft.Storage/storageAccounts"),
            resource_name: String::from("stprod01"),
            property: String::from("sku"),
            expected_value: String::from("Standard_GRS"),
            actual_value: String::from("Standard_LRS"),
            severity: Severity::High,
            category: Category::Cost,
            description: String::from("Storage SKU drift"),
            recommendation: String::from("Restore the declared SKU"),
            status: FindingStatus::New,
            detected_at: Utc::now(),
        };
        DriftAnalysisResult::from_findings(vec![finding], 3)
    }

    #[test]
    fn test_text_report_lists_findings() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_result(&result_with_one_finding());

        assert!(output.contains("stprod01"), "got: {output}");
        assert!(output.contains("Standard_GRS"), "got: {output}");
        assert!(output.contains("Action required"), "got: {output}");
    }

    #[test]
    fn test_clean_result_is_a_single_line() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_result(&DriftAnalysisResult::from_findings(vec![], 5));

        assert!(output.contains("No drift detected"), "got: {output}");
    }

    #[test]
    fn test_json_report_round_trips() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_result(&result_with_one_finding());

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["overall_risk"], "high");
        assert_eq!(parsed["findings"][0]["property"], "sku");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let name = "ストレージアカウント本番環境";
        let truncated = OutputFormatter::truncate(name, 10);

        assert!(truncated.ends_with("..."), "got: {truncated}");
        assert!(truncated.len() <= 10);
        assert_eq!(OutputFormatter::truncate("stprod01", 24), "stprod01");
    }

    #[test]
    fn test_rules_overview() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let classifier = Classifier::builtin().unwrap();
        let output = formatter.format_rules(&classifier);

        assert!(output.contains("Rule table version: 1"), "got: {output}");
    }
}
