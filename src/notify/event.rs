//! Notification event shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Major stages of one pipeline analysis, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStage {
    /// Fetching expected definitions from the IaC source.
    FetchExpected,
    /// Fetching observed state from Azure.
    FetchObserved,
    /// Running the diff engine and classifier.
    Diffing,
    /// Persisting findings and the scan log.
    Persisting,
}

/// What an event reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum EventKind {
    /// A stage finished; intermediate and droppable.
    Progress {
        /// Stage that completed.
        stage: AnalysisStage,
        /// Rough completion percentage of the whole analysis.
        percent: u8,
        /// Human-readable progress message.
        message: String,
    },
    /// The analysis completed; significant for convergence.
    Completed {
        /// Result summary line.
        summary: String,
    },
    /// The analysis failed; significant for convergence.
    Failed {
        /// Failure description.
        error: String,
    },
}

/// One notification event, scoped by correlation and pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    /// Tenant the event is addressed to.
    pub tenant_id: String,
    /// Correlation ID of the analysis.
    pub correlation_id: String,
    /// Pipeline the event concerns.
    pub pipeline_id: String,
    /// Event payload.
    pub kind: EventKind,
    /// When the event was emitted.
    pub emitted_at: DateTime<Utc>,
}

impl AnalysisEvent {
    /// Creates a progress event for a completed stage.
    #[must_use]
    pub fn progress(
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        stage: AnalysisStage,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            tenant_id,
            correlation_id,
            pipeline_id,
            EventKind::Progress {
                stage,
                percent: stage.percent_complete(),
                message: message.into(),
            },
        )
    }

    /// Creates a completion event.
    #[must_use]
    pub fn completed(
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self::new(
            tenant_id,
            correlation_id,
            pipeline_id,
            EventKind::Completed {
                summary: summary.into(),
            },
        )
    }

    /// Creates a failure event.
    #[must_use]
    pub fn failed(
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            tenant_id,
            correlation_id,
            pipeline_id,
            EventKind::Failed {
                error: error.into(),
            },
        )
    }

    /// Returns true for events consumers must not miss (terminal outcomes).
    #[must_use]
    pub const fn is_significant(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Completed { .. } | EventKind::Failed { .. }
        )
    }

    fn new(
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            correlation_id: correlation_id.into(),
            pipeline_id: pipeline_id.into(),
            kind,
            emitted_at: Utc::now(),
        }
    }
}

impl AnalysisStage {
    /// Rough completion percentage after this stage finishes.
    #[must_use]
    pub const fn percent_complete(self) -> u8 {
        match self {
            Self::FetchExpected => 25,
            Self::FetchObserved => 50,
            Self::Diffing => 75,
            Self::Persisting => 95,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_follows_stage() {
        let event = AnalysisEvent::progress("t", "c", "p", AnalysisStage::Diffing, "diffed");
        match event.kind {
            EventKind::Progress { percent, stage, .. } => {
                assert_eq!(percent, 75);
                assert_eq!(stage, AnalysisStage::Diffing);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(!event.is_significant());
    }

    #[test]
    fn test_terminal_events_are_significant() {
        assert!(AnalysisEvent::completed("t", "c", "p", "done").is_significant());
        assert!(AnalysisEvent::failed("t", "c", "p", "boom").is_significant());
    }
}
