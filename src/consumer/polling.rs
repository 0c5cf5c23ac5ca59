//! Fixed-interval polling consumer.
//!
//! For queue backends without server push or lease renewal: wake on a
//! fixed cadence, drain whatever is ready, process sequentially, sleep
//! again. A full batch skips the sleep so bursts drain without waiting a
//! whole interval per batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::CancelSignal;
use crate::error::Result;
use crate::settings::WorkerSettings;

use super::dispatch::{Dispatcher, Disposition};
use super::transport::QueueTransport;
use super::MessageConsumer;

/// Sequential consumer on a fixed poll cadence.
pub struct PollingConsumer {
    /// Queue transport.
    transport: Arc<dyn QueueTransport>,
    /// Shared dispatch path.
    dispatcher: Arc<Dispatcher>,
    /// Wait between polls when the queue runs dry.
    poll_interval: Duration,
    /// Lease duration requested on receive.
    visibility_timeout: Duration,
    /// Messages taken per poll.
    batch_size: usize,
    /// Worker identity, for logs.
    consumer_id: String,
}

impl PollingConsumer {
    /// Creates a polling consumer from the worker settings.
    #[must_use]
    pub fn new(
        settings: &WorkerSettings,
        transport: Arc<dyn QueueTransport>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            poll_interval: settings.poll_interval,
            visibility_timeout: settings.visibility_timeout,
            batch_size: settings.max_concurrency,
            consumer_id: settings.consumer_id.clone(),
        }
    }

    /// Receives and processes one batch; returns how many were handled.
    async fn poll_once(&self, shutdown: &CancelSignal) -> Result<usize> {
        let batch = self
            .transport
            .receive(self.batch_size, self.visibility_timeout)
            .await?;
        let received = batch.len();

        for message in batch {
            if shutdown.is_cancelled() {
                // The unprocessed remainder of the batch redelivers on
                // lease expiry.
                if let Err(err) = self.transport.abandon(&message).await {
                    warn!(message_id = %message.id, error = %err, "abandon on shutdown failed");
                }
                continue;
            }

            let disposition = self.dispatcher.dispatch(&message, shutdown.clone()).await?;
            let settled = match &disposition {
                Disposition::Complete => self.transport.complete(&message).await,
                Disposition::Abandon => self.transport.abandon(&message).await,
                Disposition::DeadLetter { reason } => {
                    self.transport.dead_letter(&message, reason).await
                }
            };
            if let Err(err) = settled {
                warn!(
                    message_id = %message.id,
                    error = %err,
                    "settlement failed, message will redeliver on lease expiry"
                );
            }
        }
        Ok(received)
    }
}

#[async_trait]
impl MessageConsumer for PollingConsumer {
    async fn run(&self, shutdown: CancelSignal) -> Result<()> {
        info!(
            consumer_id = %self.consumer_id,
            transport = self.transport.transport_type(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "polling consumer started"
        );

        let mut shutdown_wait = shutdown.clone();
        while !shutdown.is_cancelled() {
            let handled = match self.poll_once(&shutdown).await {
                Ok(handled) => handled,
                Err(err) if err.is_retryable() => {
                    warn!(error = %err, "poll failed, waiting for next interval");
                    0
                }
                Err(err) => return Err(err),
            };

            // A full batch means there may be more waiting.
            if handled == self.batch_size {
                continue;
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                () = shutdown_wait.cancelled() => break,
            }
        }

        info!(consumer_id = %self.consumer_id, "polling consumer stopped");
        Ok(())
    }

    fn consumer_type(&self) -> &'static str {
        "polling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::cancel_pair;
    use crate::engine::Classifier;
    use crate::model::{AnalysisRequest, Pipeline, PipelineStatus, ScanStatus};
    use crate::notify::BroadcastNotifier;
    use crate::orchestrator::Orchestrator;
    use crate::repository::{DriftRepository, InMemoryRepository};
    use crate::sources::{
        MockDefinitionSource, MockResourceReader, RetryPolicy, StaticPipelineDirectory,
    };
    use super::super::memory::InMemoryQueue;

    fn pipeline(id: &str) -> Pipeline {
        Pipeline {
            id: id.to_string(),
            tenant_id: String::from("tenant-a"),
            name: format!("pipeline {id}"),
            status: PipelineStatus::Active,
            subscription_id: String::from("sub-1"),
            resource_group: String::from("rg-1"),
        }
    }

    fn fixture() -> (PollingConsumer, Arc<InMemoryQueue>, Arc<InMemoryRepository>) {
        let mut definitions = MockDefinitionSource::new();
        definitions.expect_expected_resources().returning(|_, _| Ok(vec![]));
        let mut reader = MockResourceReader::new();
        reader.expect_resources_in_scope().returning(|_, _, _| Ok(vec![]));

        let repository = Arc::new(InMemoryRepository::new());
        let orchestrator = Orchestrator::new(
            Arc::new(StaticPipelineDirectory::new(vec![pipeline("pipe-1")])),
            Arc::new(definitions),
            Arc::new(reader),
            repository.clone(),
            Arc::new(BroadcastNotifier::new()),
            Arc::new(Classifier::builtin().unwrap()),
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });

        let settings = WorkerSettings {
            max_concurrency: 4,
            poll_interval: Duration::from_millis(10),
            visibility_timeout: Duration::from_secs(60),
            ..WorkerSettings::default()
        };

        let queue = Arc::new(InMemoryQueue::new());
        let consumer = PollingConsumer::new(
            &settings,
            queue.clone(),
            Arc::new(Dispatcher::new(orchestrator, settings.max_delivery_count)),
        );
        (consumer, queue, repository)
    }

    #[tokio::test]
    async fn test_polls_and_processes_messages() {
        let (consumer, queue, repository) = fixture();
        let request = AnalysisRequest::ad_hoc(
            "corr-1",
            "tenant-a",
            Some(String::from("pipe-1")),
            "scheduler",
        );
        queue.publish_request(&request).await.unwrap();

        let (handle, signal) = cancel_pair();
        let run = tokio::spawn(async move { consumer.run(signal).await });

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if queue.ready_len().await == 0 && queue.in_flight_len().await == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue did not drain in time");

        handle.cancel();
        run.await.unwrap().unwrap();

        let scans = repository
            .find_scans_by_correlation("tenant-a", "corr-1")
            .await
            .unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].status, ScanStatus::Success);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (consumer, _queue, _repository) = fixture();
        let (handle, signal) = cancel_pair();
        let run = tokio::spawn(async move { consumer.run(signal).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("consumer did not stop in time")
            .unwrap()
            .unwrap();
    }
}
