//! Driftwatch worker entrypoint.
//!
//! This is the main entrypoint for the driftwatch command-line tool.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use driftwatch::cli::{Cli, Commands, OutputFormatter};
use driftwatch::consumer::{build_consumer, Dispatcher, InMemoryQueue};
use driftwatch::context::{cancel_pair, AnalysisContext, CancelSignal};
use driftwatch::engine::Classifier;
use driftwatch::error::Result;
use driftwatch::model::{AnalysisRequest, Pipeline, PipelineStatus};
use driftwatch::notify::{BroadcastNotifier, EventKind};
use driftwatch::orchestrator::{AnalysisOutcome, Orchestrator};
use driftwatch::repository::{DriftRepository, InMemoryRepository};
use driftwatch::settings::WorkerSettings;
use driftwatch::sources::{FileDefinitionSource, FileResourceReader, StaticPipelineDirectory};

/// Main entrypoint.
fn main() -> ExitCode {
    // Load .env before anything reads the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Run {
            tenant,
            pipeline,
            expected,
            observed,
            rules,
            seed,
        } => cmd_run(&tenant, &pipeline, expected, observed, rules, seed).await,
        Commands::Analyze {
            tenant,
            pipeline,
            expected,
            observed,
            rules,
            initiated_by,
            fail_on_action,
        } => {
            cmd_analyze(
                &tenant,
                &pipeline,
                expected,
                observed,
                rules,
                &initiated_by,
                fail_on_action,
                &formatter,
            )
            .await
        }
        Commands::Rules { file } => cmd_rules(file, &formatter),
    }
}

/// Runs the queue-consuming worker until a shutdown signal arrives.
async fn cmd_run(
    tenant: &str,
    pipeline_id: &str,
    expected: PathBuf,
    observed: PathBuf,
    rules: Option<PathBuf>,
    seed: bool,
) -> Result<ExitCode> {
    let settings = WorkerSettings::from_env()?;
    info!(
        consumer_id = %settings.consumer_id,
        backend = ?settings.queue_backend,
        "starting driftwatch worker"
    );

    let classifier = load_classifier(rules)?;
    let repository = Arc::new(InMemoryRepository::new());
    let notifier = Arc::new(BroadcastNotifier::new());
    let orchestrator = build_orchestrator(
        tenant,
        pipeline_id,
        expected,
        observed,
        classifier,
        repository.clone(),
        notifier.clone(),
        &settings,
    );

    let dispatcher = Arc::new(Dispatcher::new(orchestrator, settings.max_delivery_count));
    let queue = Arc::new(InMemoryQueue::new());

    if seed {
        let request = AnalysisRequest::ad_hoc(
            Uuid::new_v4().to_string(),
            tenant,
            Some(pipeline_id.to_string()),
            "seed",
        );
        queue.publish_request(&request).await?;
        info!(correlation_id = %request.correlation_id, "seeded one analysis request");
    }

    spawn_event_logger(&notifier);

    let consumer = build_consumer(&settings, queue.clone(), dispatcher);
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            handle.cancel();
        }
    });

    consumer.run(signal).await?;

    let findings = repository.list_findings(tenant).await?;
    let dead = queue.dead_letters().await;
    info!(
        findings = findings.len(),
        dead_letters = dead.len(),
        "worker stopped"
    );
    Ok(ExitCode::SUCCESS)
}

/// Runs one analysis directly, without a queue.
#[allow(clippy::too_many_arguments)]
async fn cmd_analyze(
    tenant: &str,
    pipeline_id: &str,
    expected: PathBuf,
    observed: PathBuf,
    rules: Option<PathBuf>,
    initiated_by: &str,
    fail_on_action: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let classifier = load_classifier(rules)?;
    let repository = Arc::new(InMemoryRepository::new());
    let notifier = Arc::new(BroadcastNotifier::new());
    let orchestrator = build_orchestrator(
        tenant,
        pipeline_id,
        expected,
        observed,
        classifier,
        repository,
        notifier,
        &WorkerSettings::default(),
    );

    let correlation_id = Uuid::new_v4().to_string();
    let ctx = AnalysisContext::new(tenant, correlation_id.clone(), CancelSignal::never());
    let request = AnalysisRequest::ad_hoc(
        correlation_id,
        tenant,
        Some(pipeline_id.to_string()),
        initiated_by,
    );

    let outcome = orchestrator.run_analysis(&ctx, &request).await?;
    let AnalysisOutcome::Completed { scans } = outcome else {
        eprintln!("Nothing analyzed.");
        return Ok(ExitCode::SUCCESS);
    };

    eprintln!("{}", formatter.format_outcomes(&scans));
    let mut action_required = false;
    for scan in &scans {
        if let Some(result) = &scan.result {
            eprintln!("{}", formatter.format_result(result));
            action_required |= result.action_required;
        }
    }

    if fail_on_action && action_required {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Shows a rule table overview.
fn cmd_rules(file: Option<PathBuf>, formatter: &OutputFormatter) -> Result<ExitCode> {
    let classifier = load_classifier(file)?;
    eprintln!("{}", formatter.format_rules(&classifier));
    Ok(ExitCode::SUCCESS)
}

/// Loads a rule table from a file, or the built-in one.
fn load_classifier(path: Option<PathBuf>) -> Result<Arc<Classifier>> {
    let classifier = match path {
        Some(path) => Classifier::from_path(&path)?,
        None => Classifier::builtin()?,
    };
    Ok(Arc::new(classifier))
}

/// Wires the orchestrator over file-backed sources and a single local
/// pipeline.
#[allow(clippy::too_many_arguments)]
fn build_orchestrator(
    tenant: &str,
    pipeline_id: &str,
    expected: PathBuf,
    observed: PathBuf,
    classifier: Arc<Classifier>,
    repository: Arc<InMemoryRepository>,
    notifier: Arc<BroadcastNotifier>,
    settings: &WorkerSettings,
) -> Orchestrator {
    let pipeline = Pipeline {
        id: pipeline_id.to_string(),
        tenant_id: tenant.to_string(),
        name: format!("pipeline {pipeline_id}"),
        status: PipelineStatus::Active,
        subscription_id: String::from("local"),
        resource_group: String::from("local"),
    };

    Orchestrator::new(
        Arc::new(StaticPipelineDirectory::new(vec![pipeline])),
        Arc::new(FileDefinitionSource::new(expected)),
        Arc::new(FileResourceReader::new(observed)),
        repository,
        notifier,
        classifier,
    )
    .with_retry_policy(settings.retry_policy)
    .with_max_parallel_pipelines(settings.max_parallel_pipelines)
}

/// Logs notification events as they are published.
fn spawn_event_logger(notifier: &Arc<BroadcastNotifier>) {
    let mut events = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match &event.kind {
                    EventKind::Progress {
                        stage,
                        percent,
                        message,
                    } => {
                        debug!(
                            correlation_id = %event.correlation_id,
                            pipeline_id = %event.pipeline_id,
                            stage = ?stage,
                            percent,
                            "{message}"
                        );
                    }
                    EventKind::Completed { summary } => {
                        info!(
                            correlation_id = %event.correlation_id,
                            pipeline_id = %event.pipeline_id,
                            "{summary}"
                        );
                    }
                    EventKind::Failed { error } => {
                        warn!(
                            correlation_id = %event.correlation_id,
                            pipeline_id = %event.pipeline_id,
                            "analysis failed: {error}"
                        );
                    }
                },
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}
