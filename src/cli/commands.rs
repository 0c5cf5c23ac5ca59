//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Driftwatch - Azure infrastructure drift analysis worker.
#[derive(Parser, Debug)]
#[command(name = "driftwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI results.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the queue-consuming analysis worker.
    ///
    /// Worker knobs come from `DRIFTWATCH_*` environment variables. The
    /// demo wiring backs definitions and observed state with JSON files
    /// and the queue, repository, and notifier with in-process
    /// implementations.
    Run {
        /// Tenant the worker analyzes.
        #[arg(long, env = "DRIFTWATCH_TENANT", default_value = "local")]
        tenant: String,

        /// Pipeline identifier of the monitored pipeline.
        #[arg(long, env = "DRIFTWATCH_PIPELINE", default_value = "local-pipeline")]
        pipeline: String,

        /// JSON file with the expected resources.
        #[arg(long, env = "DRIFTWATCH_EXPECTED_FILE")]
        expected: PathBuf,

        /// JSON file with the observed resources.
        #[arg(long, env = "DRIFTWATCH_OBSERVED_FILE")]
        observed: PathBuf,

        /// Custom classification rule table (YAML).
        #[arg(long, env = "DRIFTWATCH_RULES_FILE")]
        rules: Option<PathBuf>,

        /// Enqueue one scheduled request at startup.
        #[arg(long)]
        seed: bool,
    },

    /// Analyze expected vs observed state once, without a queue.
    Analyze {
        /// Tenant recorded on the scan.
        #[arg(long, default_value = "local")]
        tenant: String,

        /// Pipeline identifier recorded on the scan.
        #[arg(long, default_value = "local-pipeline")]
        pipeline: String,

        /// JSON file with the expected resources.
        #[arg(long)]
        expected: PathBuf,

        /// JSON file with the observed resources.
        #[arg(long)]
        observed: PathBuf,

        /// Custom classification rule table (YAML).
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Recorded as the scan's initiator.
        #[arg(long, default_value = "cli")]
        initiated_by: String,

        /// Exit non-zero when any finding requires action.
        #[arg(long)]
        fail_on_action: bool,
    },

    /// Inspect a classification rule table.
    Rules {
        /// Rule table to inspect instead of the built-in one.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}
