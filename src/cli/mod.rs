//! CLI module for the Driftwatch worker.
//!
//! This module provides the command-line interface for running the
//! analysis worker and for one-shot drift analysis.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
