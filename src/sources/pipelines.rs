//! Pipeline directory contract and a static in-memory implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Pipeline;

/// Directory of monitored pipelines per tenant.
#[async_trait]
pub trait PipelineDirectory: Send + Sync {
    /// Looks up one pipeline by ID within a tenant.
    ///
    /// Returns `None` when the pipeline does not exist for the tenant.
    async fn get_pipeline(&self, tenant_id: &str, pipeline_id: &str) -> Result<Option<Pipeline>>;

    /// Lists all active pipelines for a tenant.
    ///
    /// An empty list is a valid answer, not an error.
    async fn list_active(&self, tenant_id: &str) -> Result<Vec<Pipeline>>;
}

/// Fixed pipeline directory seeded at construction.
///
/// Used by tests and the demo binary; production deployments plug in a
/// directory backed by their pipeline store.
#[derive(Debug, Default)]
pub struct StaticPipelineDirectory {
    /// Seeded pipelines.
    pipelines: Vec<Pipeline>,
}

impl StaticPipelineDirectory {
    /// Creates a directory over the given pipelines.
    #[must_use]
    pub const fn new(pipelines: Vec<Pipeline>) -> Self {
        Self { pipelines }
    }
}

#[async_trait]
impl PipelineDirectory for StaticPipelineDirectory {
    async fn get_pipeline(&self, tenant_id: &str, pipeline_id: &str) -> Result<Option<Pipeline>> {
        Ok(self
            .pipelines
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.id == pipeline_id)
            .cloned())
    }

    async fn list_active(&self, tenant_id: &str) -> Result<Vec<Pipeline>> {
        Ok(self
            .pipelines
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.is_active())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PipelineStatus;

    fn pipeline(id: &str, tenant: &str, status: PipelineStatus) -> Pipeline {
        Pipeline {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            name: format!("pipeline {id}"),
            status,
            subscription_id: String::from("sub-1"),
            resource_group: String::from("rg-1"),
        }
    }

    #[tokio::test]
    async fn test_get_pipeline_scoped_by_tenant() {
        let directory = StaticPipelineDirectory::new(vec![
            pipeline("pipe-1", "tenant-a", PipelineStatus::Active),
        ]);

        assert!(directory
            .get_pipeline("tenant-a", "pipe-1")
            .await
            .unwrap()
            .is_some());
        assert!(directory
            .get_pipeline("tenant-b", "pipe-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_active_skips_disabled() {
        let directory = StaticPipelineDirectory::new(vec![
            pipeline("pipe-1", "tenant-a", PipelineStatus::Active),
            pipeline("pipe-2", "tenant-a", PipelineStatus::Disabled),
            pipeline("pipe-3", "tenant-b", PipelineStatus::Active),
        ]);

        let active = directory.list_active("tenant-a").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "pipe-1");
    }
}
