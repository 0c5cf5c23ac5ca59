//! Domain and wire types for the Driftwatch analysis pipeline.
//!
//! This module defines the analysis request envelope, the expected and
//! observed resource shapes, drift findings, scan logs, and the in-memory
//! analysis aggregate.

mod finding;
mod request;
mod resource;
mod result;
mod scan;

pub use finding::{Category, DriftFinding, FindingStatus, Severity, EXISTENCE_PROPERTY};
pub use request::{AnalysisRequest, Priority, TriggerType};
pub use resource::{ExpectedResource, ObservedResource, Pipeline, PipelineStatus};
pub use result::DriftAnalysisResult;
pub use scan::{ScanLog, ScanStatus};
