//! Scan logs: one record per analysis attempt per pipeline.
//!
//! A scan log is created in `Running` when the orchestrator begins
//! processing a pipeline and transitions to exactly one terminal state.
//! Terminal states are immutable; the repository backstops that with an
//! etag check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle status of a scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Analysis in progress.
    Running,
    /// Analysis completed and results were persisted.
    Success,
    /// Analysis failed; `error_message` carries the cause.
    Failed,
    /// Analysis was cancelled before completion.
    Cancelled,
}

/// One analysis attempt for one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLog {
    /// Scan identifier, unique within the tenant.
    pub id: String,
    /// Owning tenant; primary key is `(tenant_id, id)`.
    pub tenant_id: String,
    /// Pipeline that was analyzed.
    pub pipeline_id: String,
    /// Correlation ID of the request that started the scan.
    pub correlation_id: String,
    /// Current lifecycle status.
    pub status: ScanStatus,
    /// When the scan started.
    pub started_at: DateTime<Utc>,
    /// When the scan reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of findings produced.
    pub drift_count: usize,
    /// Number of expected resources scanned.
    pub resources_scanned: usize,
    /// Wall-clock duration in seconds, set on completion.
    pub duration_seconds: Option<f64>,
    /// Who or what triggered the scan.
    pub triggered_by: String,
    /// Failure cause for `Failed` scans.
    pub error_message: Option<String>,
    /// Optimistic-concurrency version, bumped by the repository on update.
    pub etag: u64,
}

impl ScanStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

impl ScanLog {
    /// Starts a new scan in the `Running` state.
    ///
    /// The scan ID is derived from `(tenant, correlation, pipeline)`, so a
    /// redelivered request resumes the scan its first delivery created
    /// instead of opening a sibling record. Finding fingerprints inherit
    /// the same stability through the scan ID.
    #[must_use]
    pub fn start(
        tenant_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        correlation_id: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Self {
        let tenant_id = tenant_id.into();
        let pipeline_id = pipeline_id.into();
        let correlation_id = correlation_id.into();
        Self {
            id: Self::derive_id(&tenant_id, &correlation_id, &pipeline_id),
            tenant_id,
            pipeline_id,
            correlation_id,
            status: ScanStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            drift_count: 0,
            resources_scanned: 0,
            duration_seconds: None,
            triggered_by: triggered_by.into(),
            error_message: None,
            etag: 0,
        }
    }

    /// Marks the scan as successful with its final counts.
    pub fn succeed(&mut self, drift_count: usize, resources_scanned: usize) {
        self.drift_count = drift_count;
        self.resources_scanned = resources_scanned;
        self.finish(ScanStatus::Success);
    }

    /// Marks the scan as failed with the given cause.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error_message = Some(error.into());
        self.finish(ScanStatus::Failed);
    }

    /// Marks the scan as cancelled.
    pub fn cancel(&mut self) {
        self.finish(ScanStatus::Cancelled);
    }

    /// Returns true if the scan reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Derives the scan ID from the identity of the request.
    fn derive_id(tenant_id: &str, correlation_id: &str, pipeline_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(correlation_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(pipeline_id.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    /// Applies a terminal status and stamps completion time and duration.
    fn finish(&mut self, status: ScanStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        let elapsed = now.signed_duration_since(self.started_at);
        self.duration_seconds = Some(elapsed.num_milliseconds() as f64 / 1000.0);
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_scan() -> ScanLog {
        ScanLog::start("tenant-a", "pipe-1", "corr-1", "scheduler")
    }

    #[test]
    fn test_scan_starts_running() {
        let scan = running_scan();
        assert_eq!(scan.status, ScanStatus::Running);
        assert!(!scan.is_terminal());
        assert!(scan.completed_at.is_none());
        assert_eq!(scan.etag, 0);
    }

    #[test]
    fn test_scan_id_is_stable_per_request_and_pipeline() {
        let first = running_scan();
        let redelivered = running_scan();
        let sibling = ScanLog::start("tenant-a", "pipe-2", "corr-1", "scheduler");
        let other_tenant = ScanLog::start("tenant-b", "pipe-1", "corr-1", "scheduler");

        assert_eq!(first.id, redelivered.id);
        assert_ne!(first.id, sibling.id);
        assert_ne!(first.id, other_tenant.id);
    }

    #[test]
    fn test_succeed_records_counts_and_duration() {
        let mut scan = running_scan();
        scan.succeed(3, 12);

        assert_eq!(scan.status, ScanStatus::Success);
        assert!(scan.is_terminal());
        assert_eq!(scan.drift_count, 3);
        assert_eq!(scan.resources_scanned, 12);
        assert!(scan.completed_at.is_some());
        assert!(scan.duration_seconds.is_some());
    }

    #[test]
    fn test_fail_captures_error() {
        let mut scan = running_scan();
        scan.fail("reader timed out");

        assert_eq!(scan.status, ScanStatus::Failed);
        assert_eq!(scan.error_message.as_deref(), Some("reader timed out"));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut scan = running_scan();
        scan.cancel();
        assert_eq!(scan.status, ScanStatus::Cancelled);
        assert!(scan.is_terminal());
    }
}
