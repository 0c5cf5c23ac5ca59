//! Live Azure resource reader contract.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::context::AnalysisContext;
use crate::error::Result;
use crate::model::ObservedResource;

/// Read-only snapshot reader for deployed Azure resources.
///
/// No caching guarantee: every call reflects the live scope at read time,
/// and resources may be missing entirely.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Lists the resources currently deployed in one scope.
    ///
    /// # Errors
    ///
    /// Fails with `AuthenticationFailed` (terminal) or `Throttled`/
    /// `NetworkError` (retryable).
    async fn resources_in_scope(
        &self,
        ctx: &AnalysisContext,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ObservedResource>>;
}
