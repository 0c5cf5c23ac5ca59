//! IaC definition source contract.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::context::AnalysisContext;
use crate::error::Result;
use crate::model::ExpectedResource;

/// Source of already-extracted expected-resource definitions.
///
/// Backed in production by the CI pipeline's IaC extraction output
/// (Terraform/Bicep/ARM); the core only consumes the records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// Fetches the expected resources declared by a pipeline.
    ///
    /// # Errors
    ///
    /// Fails with `DefinitionsNotFound` when the pipeline has no extracted
    /// definitions, or `Unavailable` (retryable) when the source is down.
    async fn expected_resources(
        &self,
        ctx: &AnalysisContext,
        pipeline_id: &str,
    ) -> Result<Vec<ExpectedResource>>;
}
