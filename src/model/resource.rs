//! Expected and observed resource shapes.
//!
//! Expected resources come from an external IaC-extraction collaborator
//! and are immutable once read. Observed resources are point-in-time
//! snapshots of live Azure state; a resource may be missing entirely,
//! which is a drift finding rather than an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource definition extracted from IaC (Terraform/Bicep/ARM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedResource {
    /// Azure resource type, for example `Microsoft.Storage/storageAccounts`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Declared resource name.
    pub name: String,
    /// Declared properties; values may be scalar or nested.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// A snapshot of one deployed Azure resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedResource {
    /// Full Azure resource ID.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Azure resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource group the resource lives in.
    pub resource_group: String,
    /// Azure region.
    pub location: String,
    /// Resource tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Observed properties; same shape family as the expected map.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Lifecycle status of a monitored pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Included in "analyze all" requests.
    Active,
    /// Excluded from analysis until re-enabled.
    Disabled,
}

/// A monitored CI pipeline and the Azure scope it deploys into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline identifier.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether the pipeline participates in analysis.
    pub status: PipelineStatus,
    /// Azure subscription the pipeline deploys into.
    pub subscription_id: String,
    /// Resource group the pipeline deploys into.
    pub resource_group: String,
}

impl ExpectedResource {
    /// Creates an expected resource with the given properties.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            properties,
        }
    }
}

impl ObservedResource {
    /// Resolves a dotted property path against the observed property map.
    ///
    /// `"networkAcls.defaultAction"` walks into nested objects; a path
    /// segment that does not resolve yields `None`.
    #[must_use]
    pub fn property_at(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.properties.get(first)?;

        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl Pipeline {
    /// Returns true if the pipeline participates in analysis.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PipelineStatus::Active
    }
}
