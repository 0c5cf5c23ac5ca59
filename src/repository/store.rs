//! Drift repository trait definition.
//!
//! This module defines the common interface for scan/finding storage
//! backends. All writes are idempotent under the same entity key, and
//! scan updates carry an etag so a duplicate redelivery racing the
//! original cannot double-write.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{DriftFinding, ScanLog};

/// Trait for scan/finding storage backends.
#[async_trait]
pub trait DriftRepository: Send + Sync {
    /// Creates a scan log in its initial state.
    ///
    /// Idempotent: creating an existing `(tenant_id, id)` returns the
    /// stored record unchanged. The returned record carries the
    /// authoritative etag.
    async fn create_scan_log(&self, scan: &ScanLog) -> Result<ScanLog>;

    /// Updates a scan log conditionally on its etag.
    ///
    /// Fails with `Conflict` when the stored etag differs and with
    /// `TerminalStateImmutable` when the stored scan already reached a
    /// terminal state. Returns the record with its new etag.
    async fn update_scan_log(&self, scan: &ScanLog) -> Result<ScanLog>;

    /// Persists a batch of findings for a tenant.
    ///
    /// Upserts by finding ID, so re-saving the same scan's findings is a
    /// no-op rather than a duplication. Returns the number of newly
    /// inserted findings.
    async fn save_findings(&self, tenant_id: &str, findings: &[DriftFinding]) -> Result<usize>;

    /// Fetches one scan log by its primary key.
    async fn get_scan(&self, tenant_id: &str, scan_id: &str) -> Result<Option<ScanLog>>;

    /// Finds all scan logs recorded for a correlation ID.
    async fn find_scans_by_correlation(
        &self,
        tenant_id: &str,
        correlation_id: &str,
    ) -> Result<Vec<ScanLog>>;

    /// Lists all findings stored for a tenant.
    async fn list_findings(&self, tenant_id: &str) -> Result<Vec<DriftFinding>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl DriftRepository for Box<dyn DriftRepository> {
    async fn create_scan_log(&self, scan: &ScanLog) -> Result<ScanLog> {
        (**self).create_scan_log(scan).await
    }

    async fn update_scan_log(&self, scan: &ScanLog) -> Result<ScanLog> {
        (**self).update_scan_log(scan).await
    }

    async fn save_findings(&self, tenant_id: &str, findings: &[DriftFinding]) -> Result<usize> {
        (**self).save_findings(tenant_id, findings).await
    }

    async fn get_scan(&self, tenant_id: &str, scan_id: &str) -> Result<Option<ScanLog>> {
        (**self).get_scan(tenant_id, scan_id).await
    }

    async fn find_scans_by_correlation(
        &self,
        tenant_id: &str,
        correlation_id: &str,
    ) -> Result<Vec<ScanLog>> {
        (**self)
            .find_scans_by_correlation(tenant_id, correlation_id)
            .await
    }

    async fn list_findings(&self, tenant_id: &str) -> Result<Vec<DriftFinding>> {
        (**self).list_findings(tenant_id).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
