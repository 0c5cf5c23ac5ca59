//! Progress/result notification.
//!
//! Publishes progress, completion, and failure events for a correlation
//! ID to interested subscribers. Delivery is best-effort and
//! fire-and-forget: a notification failure is logged and dropped, never
//! retried, and never fails the analysis.

mod broadcast;
mod event;

pub use broadcast::BroadcastNotifier;
pub use event::{AnalysisEvent, AnalysisStage, EventKind};

use async_trait::async_trait;

/// Fire-and-forget event publisher.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publishes one event addressed to a tenant.
    ///
    /// Infallible by contract: implementations swallow and log transport
    /// failures.
    async fn publish(&self, tenant_id: &str, event: AnalysisEvent);
}

#[async_trait]
impl Notifier for Box<dyn Notifier> {
    async fn publish(&self, tenant_id: &str, event: AnalysisEvent) {
        (**self).publish(tenant_id, event).await;
    }
}
