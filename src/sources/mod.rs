//! Collaborator read contracts consumed by the orchestrator.
//!
//! The core never talks Azure Resource Manager or Azure DevOps wire
//! protocols itself; it reads through these traits. Implementations live
//! outside the core, except the static pipeline directory used by tests
//! and the demo binary.

mod azure;
mod definitions;
mod files;
mod pipelines;
mod retry;

pub use azure::ResourceReader;
pub use definitions::DefinitionSource;
pub use files::{FileDefinitionSource, FileResourceReader};
pub use pipelines::{PipelineDirectory, StaticPipelineDirectory};
pub use retry::{with_retries, RetryPolicy};

#[cfg(test)]
pub use azure::MockResourceReader;
#[cfg(test)]
pub use definitions::MockDefinitionSource;
