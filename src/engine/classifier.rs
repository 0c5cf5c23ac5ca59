//! Severity/category classifier backed by a versioned rule table.
//!
//! The table is data, not code: new resource types are added by editing
//! the YAML table (the built-in default ships in `rules.yaml`), never by
//! touching the diff algorithm. Precedence is property-level rule over
//! resource-type default over global default; unmatched combinations fall
//! back to Medium/Configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, RulesError};
use crate::model::{Category, Severity};

/// Built-in rule table, compiled into the binary.
const BUILTIN_RULES: &str = include_str!("rules.yaml");

/// The nature of a detected mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// The declared resource does not exist at all.
    ResourceMissing,
    /// A declared property is absent from the observed resource.
    PropertyMissing,
    /// A declared property is present with a different value.
    ValueMismatch,
}

/// Outcome of classifying one mismatch.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Classification {
    /// Assigned severity.
    pub severity: Severity,
    /// Assigned category.
    pub category: Category,
    /// Description template; may use `{resource}`, `{property}`,
    /// `{expected}` and `{actual}` placeholders.
    pub description: String,
    /// Recommendation template, same placeholders.
    pub recommendation: String,
}

/// Rules for a single property path.
#[derive(Debug, Clone, Deserialize)]
struct PropertyRule {
    /// Dotted property path; matches the exact path or any sub-path.
    property: String,
    /// Outcome when the observed value differs.
    #[serde(default)]
    mismatch: Option<Classification>,
    /// Outcome when the property is absent from the observed resource.
    #[serde(default)]
    missing: Option<Classification>,
}

/// Rules scoped to one resource type.
#[derive(Debug, Clone, Deserialize)]
struct ResourceTypeRules {
    /// Azure resource type, matched case-insensitively.
    resource_type: String,
    /// Fallback for properties of this type without their own rule.
    #[serde(default)]
    default: Option<Classification>,
    /// Property-level rules.
    #[serde(default)]
    properties: Vec<PropertyRule>,
}

/// On-disk shape of the rule table.
#[derive(Debug, Clone, Deserialize)]
struct RuleTable {
    /// Table schema version.
    version: u32,
    /// Global fallback for unmatched combinations.
    default: Classification,
    /// Classification of a missing resource.
    resource_missing: Classification,
    /// Per-resource-type rules.
    #[serde(default)]
    resource_types: Vec<ResourceTypeRules>,
    /// Property rules that apply to every resource type.
    #[serde(default)]
    global_properties: Vec<PropertyRule>,
}

/// Classifier mapping (resource type, property, mismatch kind) to
/// severity, category, and guidance text.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Parsed rule table.
    table: RuleTable,
    /// Resource-type rules indexed by lowercased type name.
    by_type: BTreeMap<String, usize>,
}

impl Classifier {
    /// Loads the built-in rule table.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`RulesError`] if the embedded table does not parse;
    /// a worker must not start without a classifier.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_RULES)
    }

    /// Loads a rule table from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`RulesError`] if the file is missing or invalid.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|_| RulesError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        Self::from_yaml(&raw)
    }

    /// Parses a rule table from YAML text.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`RulesError`] if the text does not parse or the
    /// table is structurally invalid.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let table: RuleTable = serde_yaml::from_str(raw).map_err(|e| RulesError::ParseError {
            message: e.to_string(),
        })?;

        if table.version == 0 {
            return Err(RulesError::InvalidTable {
                message: String::from("rule table version must be at least 1"),
            }
            .into());
        }

        let by_type = table
            .resource_types
            .iter()
            .enumerate()
            .map(|(index, rules)| (rules.resource_type.to_lowercase(), index))
            .collect();

        Ok(Self { table, by_type })
    }

    /// Returns the rule table schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.table.version
    }

    /// Returns the number of resource types with dedicated rules.
    #[must_use]
    pub fn resource_type_count(&self) -> usize {
        self.table.resource_types.len()
    }

    /// Returns the total number of property-level rules.
    #[must_use]
    pub fn property_rule_count(&self) -> usize {
        self.table.global_properties.len()
            + self
                .table
                .resource_types
                .iter()
                .map(|t| t.properties.len())
                .sum::<usize>()
    }

    /// Classifies one mismatch.
    ///
    /// Never fails: unmatched combinations resolve to the global default.
    #[must_use]
    pub fn classify(
        &self,
        resource_type: &str,
        property_path: &str,
        kind: MismatchKind,
    ) -> Classification {
        if kind == MismatchKind::ResourceMissing {
            return self.table.resource_missing.clone();
        }

        let type_rules = self
            .by_type
            .get(&resource_type.to_lowercase())
            .map(|&index| &self.table.resource_types[index]);

        // Property-level rule scoped to the resource type wins.
        if let Some(rules) = type_rules {
            if let Some(outcome) = Self::match_property(&rules.properties, property_path, kind) {
                return outcome;
            }
        }

        // Then cross-type property rules (location, tags).
        if let Some(outcome) =
            Self::match_property(&self.table.global_properties, property_path, kind)
        {
            return outcome;
        }

        // Then the resource-type default, then the global default.
        type_rules
            .and_then(|rules| rules.default.clone())
            .unwrap_or_else(|| self.table.default.clone())
    }

    /// Finds the first property rule matching the path with an outcome for
    /// the given kind.
    ///
    /// A rule for `tags` also matches `tags.env`; the first match wins.
    fn match_property(
        rules: &[PropertyRule],
        path: &str,
        kind: MismatchKind,
    ) -> Option<Classification> {
        rules
            .iter()
            .filter(|rule| {
                path == rule.property
                    || (path.len() > rule.property.len()
                        && path.starts_with(&rule.property)
                        && path.as_bytes()[rule.property.len()] == b'.')
            })
            .find_map(|rule| match kind {
                MismatchKind::ValueMismatch => rule.mismatch.clone(),
                MismatchKind::PropertyMissing => rule.missing.clone().or_else(|| rule.mismatch.clone()),
                MismatchKind::ResourceMissing => None,
            })
    }
}

impl Classification {
    /// Renders a template with the concrete finding context.
    #[must_use]
    pub fn render(template: &str, resource: &str, property: &str, expected: &str, actual: &str) -> String {
        template
            .replace("{resource}", resource)
            .replace("{property}", property)
            .replace("{expected}", expected)
            .replace("{actual}", actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::builtin().unwrap()
    }

    #[test]
    fn test_builtin_table_parses() {
        let c = classifier();
        assert_eq!(c.version(), 1);
        assert!(c.resource_type_count() >= 5);
        assert!(c.property_rule_count() >= 10);
    }

    #[test]
    fn test_storage_sku_mismatch_is_high_cost() {
        let outcome = classifier().classify(
            "Microsoft.Storage/storageAccounts",
            "sku",
            MismatchKind::ValueMismatch,
        );

        assert_eq!(outcome.severity, Severity::High);
        assert_eq!(outcome.category, Category::Cost);
    }

    #[test]
    fn test_resource_type_match_is_case_insensitive() {
        let outcome = classifier().classify(
            "microsoft.storage/storageaccounts",
            "sku",
            MismatchKind::ValueMismatch,
        );

        assert_eq!(outcome.severity, Severity::High);
    }

    #[test]
    fn test_unmapped_combination_falls_back_to_medium_configuration() {
        let outcome = classifier().classify(
            "Microsoft.Unknown/widgets",
            "spin",
            MismatchKind::ValueMismatch,
        );

        assert_eq!(outcome.severity, Severity::Medium);
        assert_eq!(outcome.category, Category::Configuration);
    }

    #[test]
    fn test_resource_missing_is_critical_compliance() {
        let outcome = classifier().classify(
            "Microsoft.Unknown/widgets",
            "<existence>",
            MismatchKind::ResourceMissing,
        );

        assert_eq!(outcome.severity, Severity::Critical);
        assert_eq!(outcome.category, Category::Compliance);
    }

    #[test]
    fn test_resource_type_default_beats_global_default() {
        let outcome = classifier().classify(
            "Microsoft.Network/networkSecurityGroups",
            "somethingElse",
            MismatchKind::ValueMismatch,
        );

        assert_eq!(outcome.severity, Severity::High);
        assert_eq!(outcome.category, Category::Security);
    }

    #[test]
    fn test_global_property_rule_applies_across_types() {
        let outcome = classifier().classify(
            "Microsoft.Unknown/widgets",
            "location",
            MismatchKind::ValueMismatch,
        );

        assert_eq!(outcome.severity, Severity::High);
        assert_eq!(outcome.category, Category::Compliance);
    }

    #[test]
    fn test_property_rule_matches_sub_paths() {
        let outcome = classifier().classify(
            "Microsoft.Unknown/widgets",
            "tags.environment",
            MismatchKind::ValueMismatch,
        );

        assert_eq!(outcome.severity, Severity::Low);
    }

    #[test]
    fn test_missing_property_uses_missing_outcome() {
        let outcome = classifier().classify(
            "Microsoft.Storage/storageAccounts",
            "supportsHttpsTrafficOnly",
            MismatchKind::PropertyMissing,
        );

        assert_eq!(outcome.severity, Severity::Critical);
        assert_eq!(outcome.category, Category::Security);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let err = Classifier::from_yaml("version: [").unwrap_err();
        assert!(err.to_string().contains("parse"), "got: {err}");
    }

    #[test]
    fn test_zero_version_is_rejected() {
        let raw = r#"
version: 0
default:
  severity: medium
  category: configuration
  description: d
  recommendation: r
resource_missing:
  severity: critical
  category: compliance
  description: d
  recommendation: r
"#;
        assert!(Classifier::from_yaml(raw).is_err());
    }

    #[test]
    fn test_render_placeholders() {
        let text = Classification::render(
            "{resource}: {property} was {actual}, expected {expected}",
            "stprod01",
            "sku",
            "Standard_GRS",
            "Standard_LRS",
        );
        assert_eq!(text, "stprod01: sku was Standard_LRS, expected Standard_GRS");
    }
}
