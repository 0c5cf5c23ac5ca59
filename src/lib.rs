// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Driftwatch
//!
//! An asynchronous analysis pipeline that detects configuration drift
//! between infrastructure-as-code definitions and live Azure resource
//! state.
//!
//! ## Overview
//!
//! Driftwatch consumes analysis requests from a message queue, then for
//! each monitored pipeline:
//!
//! - Fetches the expected resources extracted from IaC (Terraform,
//!   Bicep, ARM) and the observed state of the deployed resources
//! - Diffs expected against observed, property by property
//! - Classifies every mismatch with a severity and a category from a
//!   data-driven rule table
//! - Persists findings and a scan log idempotently
//! - Publishes progress and result notifications
//!
//! Delivery is at-least-once: a redelivered request must converge to the
//! same persisted state, never a duplicate scan.
//!
//! ## Modules
//!
//! - [`model`]: Wire and domain types (requests, resources, findings,
//!   scan logs)
//! - [`engine`]: Pure diff engine and drift classifier
//! - [`sources`]: Read contracts for definitions, live state, and
//!   pipelines
//! - [`repository`]: Idempotent scan/finding persistence
//! - [`orchestrator`]: End-to-end analysis of one request
//! - [`consumer`]: Queue transports and consumption loops
//! - [`notify`]: Progress/result notification
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use driftwatch::context::{AnalysisContext, CancelSignal};
//! use driftwatch::engine::Classifier;
//! use driftwatch::model::AnalysisRequest;
//! use driftwatch::notify::BroadcastNotifier;
//! use driftwatch::orchestrator::Orchestrator;
//! use driftwatch::repository::InMemoryRepository;
//! use driftwatch::sources::{
//!     FileDefinitionSource, FileResourceReader, StaticPipelineDirectory,
//! };
//!
//! # async fn example() -> driftwatch::error::Result<()> {
//! let orchestrator = Orchestrator::new(
//!     Arc::new(StaticPipelineDirectory::new(vec![])),
//!     Arc::new(FileDefinitionSource::new("expected.json".into())),
//!     Arc::new(FileResourceReader::new("observed.json".into())),
//!     Arc::new(InMemoryRepository::new()),
//!     Arc::new(BroadcastNotifier::new()),
//!     Arc::new(Classifier::builtin()?),
//! );
//!
//! let request = AnalysisRequest::ad_hoc("corr-1", "tenant-a", None, "docs");
//! let ctx = AnalysisContext::new("tenant-a", "corr-1", CancelSignal::never());
//! let outcome = orchestrator.run_analysis(&ctx, &request).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod consumer;
pub mod context;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod repository;
pub mod settings;
pub mod sources;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use consumer::{build_consumer, Dispatcher, InMemoryQueue, MessageConsumer, QueueTransport};
pub use context::{cancel_pair, AnalysisContext, CancelHandle, CancelSignal};
pub use engine::{Classifier, DiffEngine};
pub use error::{DriftwatchError, ErrorKind, Result};
pub use model::{
    AnalysisRequest, DriftAnalysisResult, DriftFinding, ExpectedResource, ObservedResource,
    ScanLog, ScanStatus, Severity,
};
pub use notify::{AnalysisEvent, BroadcastNotifier, Notifier};
pub use orchestrator::{AnalysisOutcome, Orchestrator, PipelineScanOutcome};
pub use repository::{DriftRepository, InMemoryRepository};
pub use settings::WorkerSettings;
pub use sources::{DefinitionSource, PipelineDirectory, ResourceReader};
