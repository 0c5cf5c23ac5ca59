//! Message dispatch: decode, analyze, decide settlement.
//!
//! Both consumer styles funnel every message through this one path so
//! that settlement decisions stay identical regardless of transport.

use tracing::{info, warn};

use crate::context::{AnalysisContext, CancelSignal};
use crate::error::{AnalysisError, DriftwatchError, ErrorKind, Result};
use crate::model::AnalysisRequest;
use crate::orchestrator::{AnalysisOutcome, Orchestrator};

use super::transport::QueueMessage;

/// How a processed message should be settled on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Processing finished; remove the message.
    Complete,
    /// Processing should be retried later; release the lease.
    Abandon,
    /// The message will never process successfully; park it.
    DeadLetter {
        /// Reason recorded alongside the parked message.
        reason: String,
    },
}

/// Maps queue messages onto orchestrator runs and outcomes onto
/// settlement decisions.
pub struct Dispatcher {
    /// Analysis entry point.
    orchestrator: Orchestrator,
    /// Delivery count at which transient failures stop being retried.
    max_delivery_count: u32,
}

impl Dispatcher {
    /// Creates a dispatcher over the given orchestrator.
    #[must_use]
    pub fn new(orchestrator: Orchestrator, max_delivery_count: u32) -> Self {
        Self {
            orchestrator,
            max_delivery_count: max_delivery_count.max(1),
        }
    }

    /// Processes one message and decides its settlement.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions; everything else maps
    /// to a [`Disposition`].
    pub async fn dispatch(
        &self,
        message: &QueueMessage,
        cancel: CancelSignal,
    ) -> Result<Disposition> {
        let request = match AnalysisRequest::from_json(&message.body) {
            Ok(request) => request,
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    error = %err,
                    "malformed message, dead-lettering"
                );
                return Ok(Disposition::DeadLetter {
                    reason: err.to_string(),
                });
            }
        };

        let ctx = AnalysisContext::new(&request.tenant_id, &request.correlation_id, cancel);
        match self.orchestrator.run_analysis(&ctx, &request).await {
            Ok(outcome) => {
                self.log_outcome(&ctx, &outcome);
                Ok(Disposition::Complete)
            }
            Err(DriftwatchError::Analysis(AnalysisError::Cancelled { .. })) => {
                // Worker shutdown mid-message; let it be redelivered.
                info!(
                    message_id = %message.id,
                    correlation_id = %ctx.correlation_id,
                    "processing cancelled, releasing message"
                );
                Ok(Disposition::Abandon)
            }
            Err(err) => self.settle_error(message, &ctx, err),
        }
    }

    /// Maps a processing error onto a settlement decision.
    fn settle_error(
        &self,
        message: &QueueMessage,
        ctx: &AnalysisContext,
        err: DriftwatchError,
    ) -> Result<Disposition> {
        match err.kind() {
            ErrorKind::Fatal => Err(err),
            ErrorKind::Malformed => Ok(Disposition::DeadLetter {
                reason: err.to_string(),
            }),
            ErrorKind::NotFound => {
                // Retrying cannot make a missing pipeline appear; the
                // message is settled so it stops clogging the queue.
                warn!(
                    correlation_id = %ctx.correlation_id,
                    error = %err,
                    "analysis target not found, completing message"
                );
                Ok(Disposition::Complete)
            }
            ErrorKind::Transient => {
                if message.delivery_count >= self.max_delivery_count {
                    warn!(
                        message_id = %message.id,
                        delivery_count = message.delivery_count,
                        "delivery budget exhausted, dead-lettering"
                    );
                    Ok(Disposition::DeadLetter {
                        reason: format!(
                            "exceeded {} deliveries; last error: {err}",
                            self.max_delivery_count
                        ),
                    })
                } else {
                    Ok(Disposition::Abandon)
                }
            }
            ErrorKind::Terminal => Ok(Disposition::DeadLetter {
                reason: err.to_string(),
            }),
        }
    }

    fn log_outcome(&self, ctx: &AnalysisContext, outcome: &AnalysisOutcome) {
        match outcome {
            AnalysisOutcome::Duplicate => {
                info!(correlation_id = %ctx.correlation_id, "duplicate request, no-op");
            }
            AnalysisOutcome::NoActivePipelines => {
                info!(tenant_id = %ctx.tenant_id, "no active pipelines");
            }
            AnalysisOutcome::Completed { scans } => {
                info!(
                    correlation_id = %ctx.correlation_id,
                    pipelines = scans.len(),
                    drift_total = scans.iter().map(|s| s.drift_count).sum::<usize>(),
                    "analysis request processed"
                );
            }
        }
    }
}
