//! File-backed collaborator sources.
//!
//! Back the one-shot CLI path: expected and observed state are read from
//! JSON files instead of Azure DevOps and Azure Resource Manager.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::context::AnalysisContext;
use crate::error::{AzureError, Result, SourceError};
use crate::model::{ExpectedResource, ObservedResource};

use super::azure::ResourceReader;
use super::definitions::DefinitionSource;

/// Expected-resource definitions read from a JSON file.
#[derive(Debug, Clone)]
pub struct FileDefinitionSource {
    /// Path to the definitions file.
    path: PathBuf,
}

/// Observed resources read from a JSON file.
#[derive(Debug, Clone)]
pub struct FileResourceReader {
    /// Path to the snapshot file.
    path: PathBuf,
}

impl FileDefinitionSource {
    /// Creates a source over the given definitions file.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FileResourceReader {
    /// Creates a reader over the given snapshot file.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DefinitionSource for FileDefinitionSource {
    async fn expected_resources(
        &self,
        _ctx: &AnalysisContext,
        pipeline_id: &str,
    ) -> Result<Vec<ExpectedResource>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|_| {
            SourceError::DefinitionsNotFound {
                pipeline_id: pipeline_id.to_string(),
            }
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            SourceError::MalformedDefinition {
                pipeline_id: pipeline_id.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl ResourceReader for FileResourceReader {
    async fn resources_in_scope(
        &self,
        _ctx: &AnalysisContext,
        _subscription_id: &str,
        _resource_group: &str,
    ) -> Result<Vec<ObservedResource>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            AzureError::InvalidResponse {
                message: format!("cannot read snapshot {}: {e}", self.path.display()),
            }
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            AzureError::InvalidResponse {
                message: format!("invalid snapshot {}: {e}", self.path.display()),
            }
            .into()
        })
    }
}
