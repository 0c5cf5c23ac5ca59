//! Diff engine comparing expected IaC definitions against observed state.
//!
//! The engine is purely structural and deterministic: the same pair of
//! inputs always yields the same ordered findings (ascending by property
//! path), which keeps tests reproducible and persistence idempotent.
//!
//! The diff is directional by design: only properties declared in the
//! expected definition are checked. Properties that exist solely on the
//! observed resource are not reported, so Azure-managed side-effect
//! properties do not produce false positives.

use serde_json::Value;
use tracing::debug;

use crate::model::{
    DriftFinding, ExpectedResource, FindingStatus, ObservedResource, EXISTENCE_PROPERTY,
};

use super::classifier::{Classification, Classifier, MismatchKind};

/// Rendering used for a declared property absent from the observed state.
const MISSING_VALUE: &str = "<missing>";

/// Property paths whose string values compare case-insensitively.
///
/// Azure normalizes casing for these (resource type names, SKU names,
/// region names), so a pure casing difference is not drift.
const CASE_INSENSITIVE_PATHS: &[&str] = &["type", "kind", "location", "sku", "sku.name", "sku.tier"];

/// Engine for computing drift findings for a single resource.
#[derive(Debug)]
pub struct DiffEngine<'a> {
    /// Classifier consulted for every mismatch.
    classifier: &'a Classifier,
}

impl<'a> DiffEngine<'a> {
    /// Creates a diff engine over the given classifier.
    #[must_use]
    pub const fn new(classifier: &'a Classifier) -> Self {
        Self { classifier }
    }

    /// Compares one expected resource against its observed counterpart.
    ///
    /// Returns zero or more findings, ordered ascending by property path.
    /// An absent observed resource yields exactly one `<existence>` finding
    /// and no per-property diffing.
    #[must_use]
    pub fn diff(
        &self,
        scan_id: &str,
        expected: &ExpectedResource,
        observed: Option<&ObservedResource>,
    ) -> Vec<DriftFinding> {
        let Some(observed) = observed else {
            debug!(
                resource = %expected.name,
                "expected resource not found in observed scope"
            );
            return vec![self.missing_resource_finding(scan_id, expected)];
        };

        let mut findings = Vec::new();

        for (path, declared) in flatten_properties(&expected.properties) {
            match observed.property_at(&path) {
                None => {
                    findings.push(self.property_finding(
                        scan_id,
                        expected,
                        observed,
                        &path,
                        declared,
                        None,
                        MismatchKind::PropertyMissing,
                    ));
                }
                Some(actual) if !values_equal(declared, actual, &path) => {
                    findings.push(self.property_finding(
                        scan_id,
                        expected,
                        observed,
                        &path,
                        declared,
                        Some(actual),
                        MismatchKind::ValueMismatch,
                    ));
                }
                // Equal values are silence.
                Some(_) => {}
            }
        }

        findings.sort_by(|a, b| a.property.cmp(&b.property));
        findings
    }

    /// Builds the single finding for an entirely missing resource.
    fn missing_resource_finding(
        &self,
        scan_id: &str,
        expected: &ExpectedResource,
    ) -> DriftFinding {
        let outcome =
            self.classifier
                .classify(&expected.resource_type, EXISTENCE_PROPERTY, MismatchKind::ResourceMissing);

        build_finding(
            scan_id,
            &expected.name,
            &expected.resource_type,
            &expected.name,
            EXISTENCE_PROPERTY,
            "present",
            "absent",
            &outcome,
        )
    }

    /// Builds a finding for one drifted or missing property.
    #[allow(clippy::too_many_arguments)]
    fn property_finding(
        &self,
        scan_id: &str,
        expected: &ExpectedResource,
        observed: &ObservedResource,
        path: &str,
        declared: &Value,
        actual: Option<&Value>,
        kind: MismatchKind,
    ) -> DriftFinding {
        let outcome = self
            .classifier
            .classify(&expected.resource_type, path, kind);
        let expected_text = canonical(declared);
        let actual_text = actual.map_or_else(|| String::from(MISSING_VALUE), canonical);

        build_finding(
            scan_id,
            &observed.id,
            &expected.resource_type,
            &expected.name,
            path,
            &expected_text,
            &actual_text,
            &outcome,
        )
    }
}

/// Assembles a finding from a classification outcome.
#[allow(clippy::too_many_arguments)]
fn build_finding(
    scan_id: &str,
    resource_id: &str,
    resource_type: &str,
    resource_name: &str,
    property: &str,
    expected_value: &str,
    actual_value: &str,
    outcome: &Classification,
) -> DriftFinding {
    DriftFinding {
        id: DriftFinding::fingerprint(scan_id, resource_id, property),
        resource_id: resource_id.to_string(),
        resource_type: resource_type.to_string(),
        resource_name: resource_name.to_string(),
        property: property.to_string(),
        expected_value: expected_value.to_string(),
        actual_value: actual_value.to_string(),
        severity: outcome.severity,
        category: outcome.category,
        description: Classification::render(
            &outcome.description,
            resource_name,
            property,
            expected_value,
            actual_value,
        ),
        recommendation: Classification::render(
            &outcome.recommendation,
            resource_name,
            property,
            expected_value,
            actual_value,
        ),
        status: FindingStatus::New,
        detected_at: chrono::Utc::now(),
    }
}

/// Flattens a property map into dotted leaf paths, ascending lexically.
///
/// Objects are descended into; arrays and scalars are leaves and compare
/// as whole values.
fn flatten_properties(
    properties: &std::collections::BTreeMap<String, Value>,
) -> Vec<(String, &Value)> {
    let mut leaves = Vec::new();
    for (name, value) in properties {
        flatten_into(name.clone(), value, &mut leaves);
    }
    leaves.sort_by(|a, b| a.0.cmp(&b.0));
    leaves
}

/// Recursive helper for [`flatten_properties`].
fn flatten_into<'v>(path: String, value: &'v Value, leaves: &mut Vec<(String, &'v Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(format!("{path}.{key}"), nested, leaves);
            }
        }
        _ => leaves.push((path, value)),
    }
}

/// Deep structural equality with numeric and casing awareness.
///
/// Numbers compare numerically (`1` equals `1.0`); strings compare
/// case-sensitively unless the property path is known case-insensitive.
fn values_equal(expected: &Value, actual: &Value, path: &str) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => a == b,
        },
        (Value::String(a), Value::String(b)) => {
            if is_case_insensitive(path) {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| values_equal(x, y, path))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key).is_some_and(|y| values_equal(x, y, path))
                })
        }
        _ => expected == actual,
    }
}

/// Returns true if string values at this path compare case-insensitively.
fn is_case_insensitive(path: &str) -> bool {
    CASE_INSENSITIVE_PATHS.contains(&path)
}

/// Canonical string rendering for storage and display.
///
/// Strings render bare; everything else renders as compact JSON.
fn canonical(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Severity};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn classifier() -> Classifier {
        Classifier::builtin().unwrap()
    }

    fn expected(properties: &[(&str, Value)]) -> ExpectedResource {
        let map: BTreeMap<String, Value> = properties
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        ExpectedResource::new("Microsoft.Storage/storageAccounts", "stprod01", map)
    }

    fn observed(properties: &[(&str, Value)]) -> ObservedResource {
        ObservedResource {
            id: String::from("/subscriptions/s1/rg1/stprod01"),
            name: String::from("stprod01"),
            resource_type: String::from("Microsoft.Storage/storageAccounts"),
            resource_group: String::from("rg1"),
            location: String::from("westeurope"),
            tags: BTreeMap::new(),
            properties: properties
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_matching_properties_yield_no_findings() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("sku", json!("Standard_GRS")), ("accessTier", json!("Hot"))]);
        let obs = observed(&[
            ("sku", json!("Standard_GRS")),
            ("accessTier", json!("Hot")),
            ("azureManagedExtra", json!("ignored")),
        ]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_absent_resource_yields_single_existence_finding() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("sku", json!("Standard_GRS"))]);

        let findings = engine.diff("scan-1", &exp, None);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.property, EXISTENCE_PROPERTY);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.category, Category::Compliance);
        assert_eq!(finding.expected_value, "present");
        assert_eq!(finding.actual_value, "absent");
    }

    #[test]
    fn test_storage_sku_scenario() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("sku", json!("Standard_GRS"))]);
        let obs = observed(&[("sku", json!("Standard_LRS"))]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.property, "sku");
        assert_eq!(finding.expected_value, "Standard_GRS");
        assert_eq!(finding.actual_value, "Standard_LRS");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.category, Category::Cost);
    }

    #[test]
    fn test_missing_property_reported() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("supportsHttpsTrafficOnly", json!(true))]);
        let obs = observed(&[("sku", json!("Standard_LRS"))]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].property, "supportsHttpsTrafficOnly");
        assert_eq!(findings[0].actual_value, MISSING_VALUE);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_nested_properties_use_dotted_paths() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[(
            "networkAcls",
            json!({"defaultAction": "Deny", "bypass": "AzureServices"}),
        )]);
        let obs = observed(&[(
            "networkAcls",
            json!({"defaultAction": "Allow", "bypass": "AzureServices"}),
        )]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].property, "networkAcls.defaultAction");
        assert_eq!(findings[0].expected_value, "Deny");
        assert_eq!(findings[0].actual_value, "Allow");
    }

    #[test]
    fn test_numbers_compare_numerically() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("capacity", json!(2))]);
        let obs = observed(&[("capacity", json!(2.0))]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_strings_compare_case_sensitively_by_default() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("accessTier", json!("Hot"))]);
        let obs = observed(&[("accessTier", json!("hot"))]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_known_paths_compare_case_insensitively() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("location", json!("WestEurope"))]);
        let obs = observed(&[("location", json!("westeurope"))]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_output_is_deterministically_ordered() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[
            ("zeta", json!("a")),
            ("alpha", json!("b")),
            ("middle", json!({"inner": "c"})),
        ]);
        let obs = observed(&[]);
        let obs = ObservedResource {
            properties: BTreeMap::new(),
            ..obs
        };

        let first = engine.diff("scan-1", &exp, Some(&obs));
        let second = engine.diff("scan-1", &exp, Some(&obs));

        let paths: Vec<&str> = first.iter().map(|f| f.property.as_str()).collect();
        assert_eq!(paths, vec!["alpha", "middle.inner", "zeta"]);
        let again: Vec<&str> = second.iter().map(|f| f.property.as_str()).collect();
        assert_eq!(paths, again);
        // Fingerprints are identical across runs too.
        let ids: Vec<&str> = first.iter().map(|f| f.id.as_str()).collect();
        let ids_again: Vec<&str> = second.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn test_observed_only_properties_are_not_drift() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("sku", json!("Standard_GRS"))]);
        let obs = observed(&[
            ("sku", json!("Standard_GRS")),
            ("provisioningState", json!("Succeeded")),
            ("creationTime", json!("2026-01-01T00:00:00Z")),
        ]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_array_values_compare_deeply() {
        let c = classifier();
        let engine = DiffEngine::new(&c);
        let exp = expected(&[("corsRules", json!([{"origin": "https://a"}]))]);
        let obs = observed(&[("corsRules", json!([{"origin": "https://b"}]))]);

        let findings = engine.diff("scan-1", &exp, Some(&obs));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].property, "corsRules");
    }
}
