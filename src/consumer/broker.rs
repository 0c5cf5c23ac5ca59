//! Lease-based broker consumer.
//!
//! Receives messages under a visibility lease, processes up to
//! `max_concurrency` of them in parallel, renews leases on long-running
//! analyses, and settles each message according to its dispatch
//! disposition. On shutdown the receive loop stops first, then in-flight
//! messages get a grace period to finish; anything still running after
//! that is left to lease expiry for redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::CancelSignal;
use crate::error::{DriftwatchError, Result};
use crate::settings::WorkerSettings;

use super::dispatch::{Dispatcher, Disposition};
use super::transport::{QueueMessage, QueueTransport};
use super::MessageConsumer;

/// Concurrent consumer for lease-capable queue backends.
pub struct BrokerConsumer {
    /// Queue transport.
    transport: Arc<dyn QueueTransport>,
    /// Shared dispatch path.
    dispatcher: Arc<Dispatcher>,
    /// In-flight message cap.
    max_concurrency: usize,
    /// Lease duration requested on receive.
    visibility_timeout: Duration,
    /// Cadence of mid-flight lease renewal.
    renewal_interval: Duration,
    /// Wait between receives when the queue is empty.
    idle_delay: Duration,
    /// Drain budget on shutdown.
    shutdown_grace: Duration,
    /// Worker identity, for logs.
    consumer_id: String,
}

impl BrokerConsumer {
    /// Creates a broker consumer from the worker settings.
    #[must_use]
    pub fn new(
        settings: &WorkerSettings,
        transport: Arc<dyn QueueTransport>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            max_concurrency: settings.max_concurrency,
            visibility_timeout: settings.visibility_timeout,
            renewal_interval: settings.lease_renewal_interval(),
            idle_delay: settings.idle_delay,
            shutdown_grace: settings.shutdown_grace,
            consumer_id: settings.consumer_id.clone(),
        }
    }

    /// Processes one message under its lease and settles it.
    async fn process_message(
        transport: Arc<dyn QueueTransport>,
        dispatcher: Arc<Dispatcher>,
        message: QueueMessage,
        cancel: CancelSignal,
        renewal_interval: Duration,
        visibility_timeout: Duration,
    ) -> Result<()> {
        let disposition = if transport.supports_lease_renewal() {
            Self::dispatch_with_renewal(
                &transport,
                &dispatcher,
                &message,
                cancel,
                renewal_interval,
                visibility_timeout,
            )
            .await
        } else {
            dispatcher.dispatch(&message, cancel).await
        }?;

        Self::settle(&transport, &message, disposition).await;
        Ok(())
    }

    /// Dispatches while periodically renewing the message lease.
    async fn dispatch_with_renewal(
        transport: &Arc<dyn QueueTransport>,
        dispatcher: &Arc<Dispatcher>,
        message: &QueueMessage,
        cancel: CancelSignal,
        renewal_interval: Duration,
        visibility_timeout: Duration,
    ) -> Result<Disposition> {
        let dispatch_fut = dispatcher.dispatch(message, cancel);
        tokio::pin!(dispatch_fut);

        let start = tokio::time::Instant::now() + renewal_interval;
        let mut renewal = tokio::time::interval_at(start, renewal_interval);

        loop {
            tokio::select! {
                result = &mut dispatch_fut => return result,
                _ = renewal.tick() => {
                    debug!(message_id = %message.id, "renewing message lease");
                    if let Err(err) = transport.renew_lease(message, visibility_timeout).await {
                        // Renewal failure means the lease may lapse and the
                        // message redeliver; idempotent processing absorbs that.
                        warn!(message_id = %message.id, error = %err, "lease renewal failed");
                    }
                }
            }
        }
    }

    /// Applies a disposition on the queue.
    ///
    /// Settlement failures are logged, not propagated: a lost lease just
    /// means the broker will redeliver.
    async fn settle(
        transport: &Arc<dyn QueueTransport>,
        message: &QueueMessage,
        disposition: Disposition,
    ) {
        let outcome = match &disposition {
            Disposition::Complete => transport.complete(message).await,
            Disposition::Abandon => transport.abandon(message).await,
            Disposition::DeadLetter { reason } => transport.dead_letter(message, reason).await,
        };
        if let Err(err) = outcome {
            warn!(
                message_id = %message.id,
                disposition = ?disposition,
                error = %err,
                "settlement failed, message will redeliver on lease expiry"
            );
        }
    }

    /// Joins one finished task, propagating fatal errors.
    fn handle_joined(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
        joined.map_err(|e| DriftwatchError::internal(format!("message task panicked: {e}")))?
    }
}

#[async_trait]
impl MessageConsumer for BrokerConsumer {
    async fn run(&self, shutdown: CancelSignal) -> Result<()> {
        info!(
            consumer_id = %self.consumer_id,
            transport = self.transport.transport_type(),
            max_concurrency = self.max_concurrency,
            "broker consumer started"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        let mut shutdown_wait = shutdown.clone();

        while !shutdown.is_cancelled() {
            while let Some(joined) = tasks.try_join_next() {
                Self::handle_joined(joined)?;
            }

            let free = semaphore.available_permits();
            if free == 0 {
                tokio::select! {
                    joined = tasks.join_next() => {
                        if let Some(joined) = joined {
                            Self::handle_joined(joined)?;
                        }
                    }
                    () = shutdown_wait.cancelled() => break,
                }
                continue;
            }

            let batch = match self.transport.receive(free, self.visibility_timeout).await {
                Ok(batch) => batch,
                Err(err) if err.is_retryable() => {
                    warn!(error = %err, "receive failed, backing off");
                    tokio::select! {
                        () = tokio::time::sleep(self.idle_delay) => {}
                        () = shutdown_wait.cancelled() => break,
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            if batch.is_empty() {
                tokio::select! {
                    () = tokio::time::sleep(self.idle_delay) => {}
                    () = shutdown_wait.cancelled() => break,
                }
                continue;
            }

            for message in batch {
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| DriftwatchError::internal("worker semaphore closed"))?;
                let transport = self.transport.clone();
                let dispatcher = self.dispatcher.clone();
                let cancel = shutdown.clone();
                let renewal_interval = self.renewal_interval;
                let visibility_timeout = self.visibility_timeout;

                tasks.spawn(async move {
                    let _permit = permit;
                    Self::process_message(
                        transport,
                        dispatcher,
                        message,
                        cancel,
                        renewal_interval,
                        visibility_timeout,
                    )
                    .await
                });
            }
        }

        info!(
            consumer_id = %self.consumer_id,
            in_flight = tasks.len(),
            "shutdown requested, draining in-flight messages"
        );
        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                Self::handle_joined(joined)?;
            }
            Ok::<(), DriftwatchError>(())
        };
        match tokio::time::timeout(self.shutdown_grace, drain).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    consumer_id = %self.consumer_id,
                    "grace period elapsed, remaining leases left to expire"
                );
            }
        }

        info!(consumer_id = %self.consumer_id, "broker consumer stopped");
        Ok(())
    }

    fn consumer_type(&self) -> &'static str {
        "broker"
    }
}
