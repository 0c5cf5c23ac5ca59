//! Queue transport contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One received queue message under a delivery lease.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Broker-assigned message identifier.
    pub id: String,
    /// Raw message payload.
    pub body: Vec<u8>,
    /// How many times this message has been delivered, this one included.
    pub delivery_count: u32,
    /// When the message was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Opaque lease token for settlement calls.
    pub lock_token: String,
}

/// Transport over a message queue with at-least-once delivery.
///
/// Implementations map these operations onto their broker's native
/// settlement model. All settlement calls are addressed by the message's
/// lease token; settling an expired lease is a transport error, not a
/// panic, because the message may already be in flight elsewhere.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Receives up to `max_messages`, each leased for `visibility_timeout`.
    ///
    /// Returns an empty batch when the queue has nothing ready; that is
    /// not an error.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>>;

    /// Settles a message as processed; it will not be redelivered.
    async fn complete(&self, message: &QueueMessage) -> Result<()>;

    /// Releases the lease so the message becomes immediately redeliverable.
    async fn abandon(&self, message: &QueueMessage) -> Result<()>;

    /// Moves a message to the dead-letter store with a reason.
    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()>;

    /// Extends the lease on an in-flight message.
    async fn renew_lease(
        &self,
        message: &QueueMessage,
        visibility_timeout: Duration,
    ) -> Result<()>;

    /// True when the backend supports extending leases mid-flight.
    fn supports_lease_renewal(&self) -> bool;

    /// Identifies the transport backend, for logs.
    fn transport_type(&self) -> &'static str;
}
