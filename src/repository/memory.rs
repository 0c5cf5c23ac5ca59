//! In-memory repository backend.
//!
//! Reference implementation of the repository contract, used by tests and
//! the demo binary. It enforces the same etag and terminal-state rules a
//! production backend must provide.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RepositoryError, Result};
use crate::model::{DriftFinding, ScanLog};

use super::store::DriftRepository;

/// Scan and finding storage held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    /// Scans keyed by `(tenant_id, scan_id)`.
    scans: RwLock<HashMap<(String, String), ScanLog>>,
    /// Findings per tenant, keyed by finding ID.
    findings: RwLock<HashMap<String, BTreeMap<String, DriftFinding>>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriftRepository for InMemoryRepository {
    async fn create_scan_log(&self, scan: &ScanLog) -> Result<ScanLog> {
        let key = (scan.tenant_id.clone(), scan.id.clone());
        let mut scans = self.scans.write().await;

        if let Some(existing) = scans.get(&key) {
            debug!(scan_id = %scan.id, "scan already exists, returning stored record");
            return Ok(existing.clone());
        }

        let mut stored = scan.clone();
        stored.etag = 1;
        scans.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update_scan_log(&self, scan: &ScanLog) -> Result<ScanLog> {
        let key = (scan.tenant_id.clone(), scan.id.clone());
        let mut scans = self.scans.write().await;

        let Some(existing) = scans.get(&key) else {
            return Err(RepositoryError::RecordNotFound {
                key: format!("{}/{}", scan.tenant_id, scan.id),
            }
            .into());
        };

        if existing.is_terminal() {
            return Err(RepositoryError::TerminalStateImmutable {
                scan_id: scan.id.clone(),
                status: existing.status.to_string(),
            }
            .into());
        }

        if existing.etag != scan.etag {
            return Err(RepositoryError::Conflict {
                entity: format!("scan {}", scan.id),
                expected: scan.etag.to_string(),
                found: existing.etag.to_string(),
            }
            .into());
        }

        let mut stored = scan.clone();
        stored.etag = existing.etag + 1;
        scans.insert(key, stored.clone());
        Ok(stored)
    }

    async fn save_findings(&self, tenant_id: &str, findings: &[DriftFinding]) -> Result<usize> {
        let mut store = self.findings.write().await;
        let tenant_findings = store.entry(tenant_id.to_string()).or_default();

        let mut inserted = 0;
        for finding in findings {
            if tenant_findings
                .insert(finding.id.clone(), finding.clone())
                .is_none()
            {
                inserted += 1;
            }
        }

        debug!(tenant_id, total = findings.len(), inserted, "saved findings batch");
        Ok(inserted)
    }

    async fn get_scan(&self, tenant_id: &str, scan_id: &str) -> Result<Option<ScanLog>> {
        let scans = self.scans.read().await;
        Ok(scans
            .get(&(tenant_id.to_string(), scan_id.to_string()))
            .cloned())
    }

    async fn find_scans_by_correlation(
        &self,
        tenant_id: &str,
        correlation_id: &str,
    ) -> Result<Vec<ScanLog>> {
        let scans = self.scans.read().await;
        let mut matched: Vec<ScanLog> = scans
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.correlation_id == correlation_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(matched)
    }

    async fn list_findings(&self, tenant_id: &str) -> Result<Vec<DriftFinding>> {
        let store = self.findings.read().await;
        Ok(store
            .get(tenant_id)
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
