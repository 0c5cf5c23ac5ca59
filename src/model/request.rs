//! Analysis request envelope.
//!
//! This is the wire shape (`DriftAnalysisMessage`) carried on the queue.
//! Unknown fields are accepted for forward compatibility; messages missing
//! `correlationId` or `tenantId` are malformed and get dead-lettered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{MessageError, Result};

/// What triggered an analysis request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    /// Fired by the scheduler.
    #[default]
    Scheduled,
    /// Requested interactively by an operator.
    AdHoc,
    /// Re-submission of a previously failed request.
    Retry,
}

/// Processing priority of a request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Default priority.
    #[default]
    Normal,
    /// Processed ahead of normal traffic where the backend supports it.
    High,
}

/// One logical drift-analysis request.
///
/// Re-delivery of the same `correlation_id` must be treated as idempotent
/// by consumers, never as a new scan.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Globally unique ID for this logical analysis attempt.
    #[validate(length(min = 1))]
    pub correlation_id: String,

    /// Tenant the analysis belongs to.
    #[validate(length(min = 1))]
    pub tenant_id: String,

    /// Target pipeline; absent means all active pipelines for the tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,

    /// What triggered the request.
    #[serde(default)]
    pub trigger_type: TriggerType,

    /// Who or what initiated the request.
    #[serde(default = "default_initiated_by")]
    pub initiated_by: String,

    /// When the request was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Number of retries of this logical request so far.
    #[serde(default)]
    pub retry_count: u32,

    /// Processing priority.
    #[serde(default)]
    pub priority: Priority,
}

/// Default author for requests that omit `initiatedBy`.
fn default_initiated_by() -> String {
    String::from("system")
}

impl AnalysisRequest {
    /// Creates a new ad-hoc request for a single pipeline.
    #[must_use]
    pub fn ad_hoc(
        correlation_id: impl Into<String>,
        tenant_id: impl Into<String>,
        pipeline_id: Option<String>,
        initiated_by: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tenant_id: tenant_id.into(),
            pipeline_id,
            trigger_type: TriggerType::AdHoc,
            initiated_by: initiated_by.into(),
            created_at: Utc::now(),
            retry_count: 0,
            priority: Priority::Normal,
        }
    }

    /// Decodes and validates a request from a queue message body.
    ///
    /// # Errors
    ///
    /// Returns a [`MessageError`] when the payload is not valid JSON or a
    /// required field is missing or empty.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let request: Self = serde_json::from_slice(body).map_err(|e| {
            let text = e.to_string();
            if text.contains("missing field") {
                let field = text
                    .split('`')
                    .nth(1)
                    .unwrap_or("unknown")
                    .to_string();
                MessageError::missing_field(wire_name(&field))
            } else {
                MessageError::invalid_json(text)
            }
        })?;

        request.ensure_required_fields()?;
        Ok(request)
    }

    /// Serializes the request to its wire JSON shape.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| MessageError::invalid_json(e.to_string()).into())
    }

    /// Checks that the required identity fields are non-empty.
    fn ensure_required_fields(&self) -> Result<()> {
        if self.validate().is_err() {
            let field = if self.correlation_id.trim().is_empty() {
                "correlationId"
            } else {
                "tenantId"
            };
            return Err(MessageError::missing_field(field).into());
        }
        Ok(())
    }

    /// Returns true if this request targets every active pipeline.
    #[must_use]
    pub const fn targets_all_pipelines(&self) -> bool {
        self.pipeline_id.is_none()
    }
}

/// Maps a Rust field name back to its camelCase wire name.
fn wire_name(field: &str) -> &str {
    match field {
        "correlation_id" | "correlationId" => "correlationId",
        "tenant_id" | "tenantId" => "tenantId",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_message_decodes() {
        let body = br#"{"correlationId": "corr-1", "tenantId": "tenant-a"}"#;
        let request = AnalysisRequest::from_json(body).unwrap();

        assert_eq!(request.correlation_id, "corr-1");
        assert_eq!(request.tenant_id, "tenant-a");
        assert!(request.targets_all_pipelines());
        assert_eq!(request.trigger_type, TriggerType::Scheduled);
        assert_eq!(request.retry_count, 0);
        assert_eq!(request.priority, Priority::Normal);
        assert_eq!(request.initiated_by, "system");
    }

    #[test]
    fn test_missing_tenant_is_malformed() {
        let body = br#"{"correlationId": "corr-1"}"#;
        let err = AnalysisRequest::from_json(body).unwrap_err();

        assert!(err.to_string().contains("tenantId"), "got: {err}");
    }

    #[test]
    fn test_empty_correlation_is_malformed() {
        let body = br#"{"correlationId": "", "tenantId": "tenant-a"}"#;
        let err = AnalysisRequest::from_json(body).unwrap_err();

        assert!(err.to_string().contains("correlationId"), "got: {err}");
    }

    #[test]
    fn test_unknown_fields_are_accepted() {
        let body = br#"{
            "correlationId": "corr-1",
            "tenantId": "tenant-a",
            "pipelineId": "pipe-9",
            "triggerType": "adhoc",
            "priority": "high",
            "someFutureField": {"nested": true}
        }"#;
        let request = AnalysisRequest::from_json(body).unwrap();

        assert_eq!(request.pipeline_id.as_deref(), Some("pipe-9"));
        assert_eq!(request.trigger_type, TriggerType::AdHoc);
        assert_eq!(request.priority, Priority::High);
    }

    #[test]
    fn test_garbage_payload_is_malformed() {
        let err = AnalysisRequest::from_json(b"not json at all").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"), "got: {err}");
    }

    #[test]
    fn test_round_trip() {
        let request =
            AnalysisRequest::ad_hoc("corr-7", "tenant-b", Some(String::from("pipe-1")), "alice");
        let body = request.to_json().unwrap();
        let decoded = AnalysisRequest::from_json(&body).unwrap();

        assert_eq!(decoded.correlation_id, "corr-7");
        assert_eq!(decoded.pipeline_id.as_deref(), Some("pipe-1"));
        assert_eq!(decoded.trigger_type, TriggerType::AdHoc);
    }
}
