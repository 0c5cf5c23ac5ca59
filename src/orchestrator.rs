//! Analysis orchestration.
//!
//! This module drives one drift-analysis request end to end: resolve the
//! target pipelines, fetch expected and observed state, run the diff
//! engine, persist results idempotently, and report progress and
//! completion. Each pipeline is analyzed independently; one pipeline's
//! failure never aborts its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::{AnalysisContext, CancelSignal};
use crate::engine::{Classifier, DiffEngine};
use crate::error::{AnalysisError, DriftwatchError, ErrorKind, Result};
use crate::model::{
    AnalysisRequest, DriftAnalysisResult, DriftFinding, ExpectedResource, ObservedResource,
    Pipeline, ScanLog, ScanStatus,
};
use crate::notify::{AnalysisEvent, AnalysisStage, Notifier};
use crate::repository::DriftRepository;
use crate::sources::{with_retries, DefinitionSource, PipelineDirectory, ResourceReader, RetryPolicy};

/// Outcome of dispatching one analysis request.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// The correlation ID already reached a terminal scan; nothing done.
    Duplicate,
    /// The tenant has no active pipelines; a successful no-op.
    NoActivePipelines,
    /// The request was dispatched; per-pipeline outcomes follow.
    Completed {
        /// One outcome per analyzed pipeline.
        scans: Vec<PipelineScanOutcome>,
    },
}

/// Outcome of one pipeline's scan within a request.
#[derive(Debug, Clone)]
pub struct PipelineScanOutcome {
    /// Pipeline that was analyzed.
    pub pipeline_id: String,
    /// Scan log recorded for the attempt, if one was created.
    pub scan_id: Option<String>,
    /// Terminal status the scan reached.
    pub status: ScanStatus,
    /// Number of findings produced.
    pub drift_count: usize,
    /// Failure cause for failed scans.
    pub error: Option<String>,
    /// Aggregate result for successful scans.
    pub result: Option<DriftAnalysisResult>,
}

/// Orchestrator for drift-analysis requests.
///
/// Exclusively owns the scan-log lifecycle; collaborators are read
/// through their traits and the diff engine stays pure.
#[derive(Clone)]
pub struct Orchestrator {
    /// Pipeline directory.
    pipelines: Arc<dyn PipelineDirectory>,
    /// IaC definition source.
    definitions: Arc<dyn DefinitionSource>,
    /// Live Azure resource reader.
    reader: Arc<dyn ResourceReader>,
    /// Scan/finding repository.
    repository: Arc<dyn DriftRepository>,
    /// Event publisher.
    notifier: Arc<dyn Notifier>,
    /// Classification rule table.
    classifier: Arc<Classifier>,
    /// Retry budget for collaborator calls.
    retry_policy: RetryPolicy,
    /// Cap on concurrently analyzed pipelines within one request.
    max_parallel_pipelines: usize,
}

impl Orchestrator {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        pipelines: Arc<dyn PipelineDirectory>,
        definitions: Arc<dyn DefinitionSource>,
        reader: Arc<dyn ResourceReader>,
        repository: Arc<dyn DriftRepository>,
        notifier: Arc<dyn Notifier>,
        classifier: Arc<Classifier>,
    ) -> Self {
        Self {
            pipelines,
            definitions,
            reader,
            repository,
            notifier,
            classifier,
            retry_policy: RetryPolicy::default(),
            max_parallel_pipelines: 1,
        }
    }

    /// Sets the retry budget for collaborator calls.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Allows up to `cap` pipelines of one request to run concurrently.
    ///
    /// Pipelines are independent and share no mutable state, so this is
    /// safe; the default is sequential.
    #[must_use]
    pub fn with_max_parallel_pipelines(mut self, cap: usize) -> Self {
        self.max_parallel_pipelines = if cap == 0 { 1 } else { cap };
        self
    }

    /// Runs one analysis request.
    ///
    /// Individual pipeline failures surface in their scan log and failure
    /// notification, not as an error here; only request-level problems
    /// (unknown pipeline, fatal errors) are returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineNotFound` when a named pipeline does not exist for
    /// the tenant, and propagates fatal errors.
    pub async fn run_analysis(
        &self,
        ctx: &AnalysisContext,
        request: &AnalysisRequest,
    ) -> Result<AnalysisOutcome> {
        info!(
            correlation_id = %ctx.correlation_id,
            tenant_id = %ctx.tenant_id,
            pipeline_id = request.pipeline_id.as_deref().unwrap_or("<all-active>"),
            trigger = ?request.trigger_type,
            "starting drift analysis"
        );

        // Dedupe guard: a redelivered correlation ID must be a no-op.
        if self.already_processed(ctx).await? {
            info!(
                correlation_id = %ctx.correlation_id,
                "correlation already reached a terminal scan, skipping duplicate"
            );
            return Ok(AnalysisOutcome::Duplicate);
        }

        let targets = self.resolve_targets(ctx, request).await?;
        if targets.is_empty() {
            info!(tenant_id = %ctx.tenant_id, "no active pipelines, nothing to analyze");
            return Ok(AnalysisOutcome::NoActivePipelines);
        }

        let scans = if self.max_parallel_pipelines > 1 && targets.len() > 1 {
            self.analyze_parallel(ctx, request, targets).await?
        } else {
            let mut scans = Vec::with_capacity(targets.len());
            for pipeline in targets {
                scans.push(self.analyze_pipeline(ctx, request, &pipeline).await?);
            }
            scans
        };

        Ok(AnalysisOutcome::Completed { scans })
    }

    /// Checks whether this correlation already produced a terminal scan.
    async fn already_processed(&self, ctx: &AnalysisContext) -> Result<bool> {
        let scans = self
            .repository
            .find_scans_by_correlation(&ctx.tenant_id, &ctx.correlation_id)
            .await?;
        Ok(scans.iter().any(ScanLog::is_terminal))
    }

    /// Resolves the pipelines targeted by a request.
    async fn resolve_targets(
        &self,
        ctx: &AnalysisContext,
        request: &AnalysisRequest,
    ) -> Result<Vec<Pipeline>> {
        match &request.pipeline_id {
            Some(pipeline_id) => {
                let pipeline = self
                    .pipelines
                    .get_pipeline(&ctx.tenant_id, pipeline_id)
                    .await?
                    .ok_or_else(|| {
                        DriftwatchError::Analysis(AnalysisError::PipelineNotFound {
                            pipeline_id: pipeline_id.clone(),
                            tenant_id: ctx.tenant_id.clone(),
                        })
                    })?;
                Ok(vec![pipeline])
            }
            None => self.pipelines.list_active(&ctx.tenant_id).await,
        }
    }

    /// Analyzes pipelines concurrently, bounded by the configured cap.
    async fn analyze_parallel(
        &self,
        ctx: &AnalysisContext,
        request: &AnalysisRequest,
        targets: Vec<Pipeline>,
    ) -> Result<Vec<PipelineScanOutcome>> {
        let mut join_set: JoinSet<Result<PipelineScanOutcome>> = JoinSet::new();
        let mut scans = Vec::with_capacity(targets.len());
        let mut pending = targets.into_iter();

        loop {
            while join_set.len() < self.max_parallel_pipelines {
                let Some(pipeline) = pending.next() else { break };
                let this = self.clone();
                let task_ctx = ctx.clone();
                let task_request = request.clone();
                join_set.spawn(async move {
                    this.analyze_pipeline(&task_ctx, &task_request, &pipeline).await
                });
            }

            match join_set.join_next().await {
                Some(joined) => {
                    let outcome = joined
                        .map_err(|e| DriftwatchError::internal(format!("scan task panicked: {e}")))??;
                    scans.push(outcome);
                }
                None => break,
            }
        }

        // Stable report order regardless of completion order.
        scans.sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
        Ok(scans)
    }

    /// Analyzes one pipeline and converts every non-fatal failure into a
    /// terminal scan state.
    async fn analyze_pipeline(
        &self,
        ctx: &AnalysisContext,
        request: &AnalysisRequest,
        pipeline: &Pipeline,
    ) -> Result<PipelineScanOutcome> {
        debug!(pipeline_id = %pipeline.id, "analyzing pipeline");

        let scan = ScanLog::start(
            &ctx.tenant_id,
            &pipeline.id,
            &ctx.correlation_id,
            &request.initiated_by,
        );
        // Created before the first cancellation gate so that a cancelled
        // analysis still leaves an audit record.
        let scan = match self.repository.create_scan_log(&scan).await {
            Ok(scan) => scan,
            Err(err) if err.kind() == ErrorKind::Fatal => return Err(err),
            Err(err) => {
                error!(pipeline_id = %pipeline.id, error = %err, "could not create scan log");
                self.publish_failed(ctx, &pipeline.id, &err.to_string()).await;
                return Ok(PipelineScanOutcome {
                    pipeline_id: pipeline.id.clone(),
                    scan_id: None,
                    status: ScanStatus::Failed,
                    drift_count: 0,
                    error: Some(err.to_string()),
                    result: None,
                });
            }
        };

        match self.run_scan_stages(ctx, pipeline, &scan).await {
            Ok(result) => self.finish_success(ctx, pipeline, scan, result).await,
            Err(err) if err.kind() == ErrorKind::Fatal => Err(err),
            Err(err) if matches!(&err, DriftwatchError::Analysis(AnalysisError::Cancelled { .. })) => {
                self.finish_cancelled(ctx, pipeline, scan).await
            }
            Err(err) => self.finish_failed(ctx, pipeline, scan, &err).await,
        }
    }

    /// Runs the fetch/diff/persist stages for one scan.
    async fn run_scan_stages(
        &self,
        ctx: &AnalysisContext,
        pipeline: &Pipeline,
        scan: &ScanLog,
    ) -> Result<DriftAnalysisResult> {
        let expected = with_retries(self.retry_policy, ctx, "fetch-expected", || {
            self.definitions.expected_resources(ctx, &pipeline.id)
        })
        .await?;
        self.publish_progress(
            ctx,
            &pipeline.id,
            AnalysisStage::FetchExpected,
            format!("fetched {} expected resources", expected.len()),
        )
        .await;

        let observed = with_retries(self.retry_policy, ctx, "fetch-observed", || {
            self.reader
                .resources_in_scope(ctx, &pipeline.subscription_id, &pipeline.resource_group)
        })
        .await?;
        self.publish_progress(
            ctx,
            &pipeline.id,
            AnalysisStage::FetchObserved,
            format!("observed {} live resources", observed.len()),
        )
        .await;

        ctx.ensure_active()?;
        let result = self.diff_all(&scan.id, &expected, &observed);
        self.publish_progress(
            ctx,
            &pipeline.id,
            AnalysisStage::Diffing,
            result.summary.clone(),
        )
        .await;

        with_retries(self.retry_policy, ctx, "persist-findings", || async {
            self.repository
                .save_findings(&ctx.tenant_id, &result.findings)
                .await
                .map(|_| ())
        })
        .await?;
        self.publish_progress(
            ctx,
            &pipeline.id,
            AnalysisStage::Persisting,
            format!("persisted {} findings", result.findings.len()),
        )
        .await;

        Ok(result)
    }

    /// Diffs every expected resource against its observed counterpart.
    ///
    /// Matching is by resource type and name, both case-insensitive, the
    /// way Azure itself treats identifiers.
    fn diff_all(
        &self,
        scan_id: &str,
        expected: &[ExpectedResource],
        observed: &[ObservedResource],
    ) -> DriftAnalysisResult {
        let engine = DiffEngine::new(&self.classifier);

        let observed_by_key: HashMap<(String, String), &ObservedResource> = observed
            .iter()
            .map(|r| {
                (
                    (r.resource_type.to_lowercase(), r.name.to_lowercase()),
                    r,
                )
            })
            .collect();

        let mut findings: Vec<DriftFinding> = Vec::new();
        for resource in expected {
            let key = (
                resource.resource_type.to_lowercase(),
                resource.name.to_lowercase(),
            );
            let counterpart = observed_by_key.get(&key).copied();
            findings.extend(engine.diff(scan_id, resource, counterpart));
        }

        DriftAnalysisResult::from_findings(findings, expected.len())
    }

    /// Transitions the scan to `Success` and publishes completion.
    async fn finish_success(
        &self,
        ctx: &AnalysisContext,
        pipeline: &Pipeline,
        mut scan: ScanLog,
        result: DriftAnalysisResult,
    ) -> Result<PipelineScanOutcome> {
        scan.succeed(result.findings.len(), result.resources_scanned);
        let status = self.store_terminal(ctx, &scan).await?;

        info!(
            pipeline_id = %pipeline.id,
            scan_id = %scan.id,
            drift_count = result.findings.len(),
            overall_risk = %result
                .overall_risk
                .map_or_else(|| String::from("none"), |s| s.to_string()),
            "pipeline scan completed"
        );
        self.notifier
            .publish(
                &ctx.tenant_id,
                AnalysisEvent::completed(
                    &ctx.tenant_id,
                    &ctx.correlation_id,
                    &pipeline.id,
                    result.summary.clone(),
                ),
            )
            .await;

        Ok(PipelineScanOutcome {
            pipeline_id: pipeline.id.clone(),
            scan_id: Some(scan.id),
            status,
            drift_count: result.findings.len(),
            error: None,
            result: Some(result),
        })
    }

    /// Transitions the scan to `Failed` and publishes the failure.
    async fn finish_failed(
        &self,
        ctx: &AnalysisContext,
        pipeline: &Pipeline,
        mut scan: ScanLog,
        err: &DriftwatchError,
    ) -> Result<PipelineScanOutcome> {
        warn!(
            pipeline_id = %pipeline.id,
            scan_id = %scan.id,
            error = %err,
            "pipeline scan failed"
        );
        scan.fail(err.to_string());
        let status = self.store_terminal(ctx, &scan).await?;
        self.publish_failed(ctx, &pipeline.id, &err.to_string()).await;

        Ok(PipelineScanOutcome {
            pipeline_id: pipeline.id.clone(),
            scan_id: Some(scan.id),
            status,
            drift_count: 0,
            error: Some(err.to_string()),
            result: None,
        })
    }

    /// Transitions the scan to `Cancelled`.
    async fn finish_cancelled(
        &self,
        ctx: &AnalysisContext,
        pipeline: &Pipeline,
        mut scan: ScanLog,
    ) -> Result<PipelineScanOutcome> {
        warn!(pipeline_id = %pipeline.id, scan_id = %scan.id, "pipeline scan cancelled");
        scan.cancel();
        let status = self.store_terminal(ctx, &scan).await?;
        self.publish_failed(ctx, &pipeline.id, "analysis cancelled").await;

        Ok(PipelineScanOutcome {
            pipeline_id: pipeline.id.clone(),
            scan_id: Some(scan.id),
            status,
            drift_count: 0,
            error: Some(String::from("analysis cancelled")),
            result: None,
        })
    }

    /// Writes a terminal scan state.
    ///
    /// The write runs on a non-cancellable context: it is the audit
    /// record, and a cancelled analysis still gets its `Cancelled` state
    /// stored. Transient store failures are retried; if the budget runs
    /// out the error propagates so the request is redelivered instead of
    /// being reported done with a `Running` scan on record.
    ///
    /// Losing the etag race means a concurrent redelivery already
    /// completed the scan, so the stored terminal status wins.
    async fn store_terminal(&self, ctx: &AnalysisContext, scan: &ScanLog) -> Result<ScanStatus> {
        let write_ctx = AnalysisContext::new(
            ctx.tenant_id.clone(),
            ctx.correlation_id.clone(),
            CancelSignal::never(),
        );
        let written = with_retries(self.retry_policy, &write_ctx, "store-scan", || async {
            self.repository.update_scan_log(scan).await
        })
        .await;

        match written {
            Ok(stored) => Ok(stored.status),
            Err(err) => match self.repository.get_scan(&ctx.tenant_id, &scan.id).await {
                Ok(Some(stored)) if stored.is_terminal() => {
                    warn!(
                        scan_id = %scan.id,
                        status = %stored.status,
                        "terminal scan update lost a concurrency race"
                    );
                    Ok(stored.status)
                }
                _ => Err(err),
            },
        }
    }

    /// Publishes a progress event.
    async fn publish_progress(
        &self,
        ctx: &AnalysisContext,
        pipeline_id: &str,
        stage: AnalysisStage,
        message: String,
    ) {
        self.notifier
            .publish(
                &ctx.tenant_id,
                AnalysisEvent::progress(
                    &ctx.tenant_id,
                    &ctx.correlation_id,
                    pipeline_id,
                    stage,
                    message,
                ),
            )
            .await;
    }

    /// Publishes a failure event.
    async fn publish_failed(&self, ctx: &AnalysisContext, pipeline_id: &str, error: &str) {
        self.notifier
            .publish(
                &ctx.tenant_id,
                AnalysisEvent::failed(&ctx.tenant_id, &ctx.correlation_id, pipeline_id, error),
            )
            .await;
    }
}
