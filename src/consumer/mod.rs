//! Queue consumption.
//!
//! The consumer layer receives analysis requests from a message queue,
//! hands them to the orchestrator, and settles each message according to
//! the outcome. Two consumption styles share one dispatch path: a
//! broker-style consumer with per-message leases and renewal, and a
//! polling consumer for backends that only support fixed-interval reads.
//! Delivery is at-least-once either way; idempotency lives in the
//! orchestrator, not here.

mod broker;
mod dispatch;
mod memory;
mod polling;
mod transport;

pub use broker::BrokerConsumer;
pub use dispatch::{Dispatcher, Disposition};
pub use memory::{DeadLetteredMessage, InMemoryQueue};
pub use polling::PollingConsumer;
pub use transport::{QueueMessage, QueueTransport};

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CancelSignal;
use crate::error::Result;
use crate::settings::{QueueBackend, WorkerSettings};

/// A running message-consumption loop.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Consumes messages until the shutdown signal fires, then drains
    /// in-flight work within the configured grace period.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions that should crash the
    /// worker; per-message failures are settled on the queue instead.
    async fn run(&self, shutdown: CancelSignal) -> Result<()>;

    /// Identifies the consumption style, for logs.
    fn consumer_type(&self) -> &'static str;
}

/// Builds the consumer selected by the worker settings.
#[must_use]
pub fn build_consumer(
    settings: &WorkerSettings,
    transport: Arc<dyn QueueTransport>,
    dispatcher: Arc<Dispatcher>,
) -> Box<dyn MessageConsumer> {
    match settings.queue_backend {
        QueueBackend::Broker => Box::new(BrokerConsumer::new(settings, transport, dispatcher)),
        QueueBackend::Polling => Box::new(PollingConsumer::new(settings, transport, dispatcher)),
    }
}
