//! In-process broadcast notifier.
//!
//! A bounded `tokio::sync::broadcast` channel backs the publish/subscribe
//! contract: slow subscribers lag and lose intermediate progress events,
//! which the notification contract explicitly allows.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::event::AnalysisEvent;
use super::Notifier;

/// Default channel capacity before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Best-effort in-process notifier.
#[derive(Debug)]
pub struct BroadcastNotifier {
    /// Shared event channel; subscribers filter by tenant themselves.
    sender: broadcast::Sender<AnalysisEvent>,
}

impl BroadcastNotifier {
    /// Creates a notifier with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a notifier with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to all events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, tenant_id: &str, event: AnalysisEvent) {
        debug_assert_eq!(tenant_id, event.tenant_id);

        // send only fails when nobody is listening; that is fine for a
        // best-effort channel.
        if self.sender.send(event).is_err() {
            debug!(tenant_id, "no notification subscribers, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{AnalysisStage, EventKind};

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = BroadcastNotifier::new();
        let mut receiver = notifier.subscribe();

        notifier
            .publish(
                "tenant-a",
                AnalysisEvent::completed("tenant-a", "corr-1", "pipe-1", "all clear"),
            )
            .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.correlation_id, "corr-1");
        assert!(event.is_significant());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new();
        // Must not fail or panic.
        notifier
            .publish(
                "tenant-a",
                AnalysisEvent::progress(
                    "tenant-a",
                    "corr-1",
                    "pipe-1",
                    AnalysisStage::FetchExpected,
                    "fetched",
                ),
            )
            .await;
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_progress_not_channel() {
        let notifier = BroadcastNotifier::with_capacity(1);
        let mut receiver = notifier.subscribe();

        for i in 0..5 {
            notifier
                .publish(
                    "tenant-a",
                    AnalysisEvent::progress(
                        "tenant-a",
                        "corr-1",
                        "pipe-1",
                        AnalysisStage::Diffing,
                        format!("step {i}"),
                    ),
                )
                .await;
        }
        notifier
            .publish(
                "tenant-a",
                AnalysisEvent::completed("tenant-a", "corr-1", "pipe-1", "done"),
            )
            .await;

        // The receiver lags, then still observes the terminal event.
        let mut saw_completed = false;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Completed { .. }) {
                        saw_completed = true;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        assert!(saw_completed);
    }
}
