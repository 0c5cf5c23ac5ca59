//! In-memory queue transport.
//!
//! Reference implementation of the transport contract with real
//! at-least-once semantics: visibility timeouts, delivery counts, and a
//! dead-letter store. Used by tests and the demo binary.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TransportError};
use crate::model::AnalysisRequest;

use super::transport::{QueueMessage, QueueTransport};

/// A message parked in the dead-letter store.
#[derive(Debug, Clone)]
pub struct DeadLetteredMessage {
    /// Original message identifier.
    pub id: String,
    /// Original payload.
    pub body: Vec<u8>,
    /// Why the message was dead-lettered.
    pub reason: String,
    /// Delivery count at the time of dead-lettering.
    pub delivery_count: u32,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: Vec<u8>,
    delivery_count: u32,
    enqueued_at: DateTime<Utc>,
}

#[derive(Debug)]
struct LeasedMessage {
    stored: StoredMessage,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    leased: HashMap<String, LeasedMessage>,
    dead: Vec<DeadLetteredMessage>,
}

/// Process-local queue with visibility-timeout semantics.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a raw payload.
    pub async fn push(&self, body: Vec<u8>) {
        let mut state = self.state.lock().await;
        state.ready.push_back(StoredMessage {
            id: Uuid::new_v4().to_string(),
            body,
            delivery_count: 0,
            enqueued_at: Utc::now(),
        });
    }

    /// Enqueues an analysis request in its wire shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails to serialize.
    pub async fn publish_request(&self, request: &AnalysisRequest) -> Result<()> {
        let body = request.to_json()?;
        self.push(body).await;
        Ok(())
    }

    /// Number of messages ready for delivery.
    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Number of messages currently leased.
    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.leased.len()
    }

    /// Snapshot of the dead-letter store.
    pub async fn dead_letters(&self) -> Vec<DeadLetteredMessage> {
        self.state.lock().await.dead.clone()
    }

    /// Moves messages whose lease lapsed back to the ready queue.
    fn reclaim_expired(state: &mut QueueState) {
        let now = Instant::now();
        let expired: Vec<String> = state
            .leased
            .iter()
            .filter(|(_, leased)| leased.deadline <= now)
            .map(|(token, _)| token.clone())
            .collect();

        for token in expired {
            if let Some(leased) = state.leased.remove(&token) {
                debug!(message_id = %leased.stored.id, "lease lapsed, message redelivered");
                state.ready.push_back(leased.stored);
            }
        }
    }

    fn take_leased(
        state: &mut QueueState,
        message: &QueueMessage,
    ) -> Result<LeasedMessage> {
        state.leased.remove(&message.lock_token).ok_or_else(|| {
            TransportError::LeaseLost {
                message_id: message.id.clone(),
            }
            .into()
        })
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        Self::reclaim_expired(&mut state);

        let mut batch = Vec::new();
        while batch.len() < max_messages {
            let Some(mut stored) = state.ready.pop_front() else {
                break;
            };
            stored.delivery_count += 1;

            let lock_token = Uuid::new_v4().to_string();
            batch.push(QueueMessage {
                id: stored.id.clone(),
                body: stored.body.clone(),
                delivery_count: stored.delivery_count,
                enqueued_at: stored.enqueued_at,
                lock_token: lock_token.clone(),
            });
            state.leased.insert(
                lock_token,
                LeasedMessage {
                    stored,
                    deadline: Instant::now() + visibility_timeout,
                },
            );
        }
        Ok(batch)
    }

    async fn complete(&self, message: &QueueMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::take_leased(&mut state, message)?;
        Ok(())
    }

    async fn abandon(&self, message: &QueueMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        let leased = Self::take_leased(&mut state, message)?;
        state.ready.push_back(leased.stored);
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let leased = Self::take_leased(&mut state, message)?;
        state.dead.push(DeadLetteredMessage {
            id: leased.stored.id,
            body: leased.stored.body,
            reason: reason.to_string(),
            delivery_count: leased.stored.delivery_count,
        });
        Ok(())
    }

    async fn renew_lease(
        &self,
        message: &QueueMessage,
        visibility_timeout: Duration,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let leased = state.leased.get_mut(&message.lock_token).ok_or_else(|| {
            TransportError::LeaseLost {
                message_id: message.id.clone(),
            }
        })?;
        leased.deadline = Instant::now() + visibility_timeout;
        Ok(())
    }

    fn supports_lease_renewal(&self) -> bool {
        true
    }

    fn transport_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_receive_leases_and_counts_delivery() {
        let queue = InMemoryQueue::new();
        queue.push(b"payload".to_vec()).await;

        let batch = queue.receive(10, LEASE).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].delivery_count, 1);
        assert_eq!(batch[0].body, b"payload");
        assert_eq!(queue.ready_len().await, 0);
        assert_eq!(queue.in_flight_len().await, 1);

        // A leased message is invisible to further receives.
        assert!(queue.receive(10, LEASE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_settles_message() {
        let queue = InMemoryQueue::new();
        queue.push(b"done".to_vec()).await;

        let batch = queue.receive(1, LEASE).await.unwrap();
        queue.complete(&batch[0]).await.unwrap();

        assert_eq!(queue.ready_len().await, 0);
        assert_eq!(queue.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_abandon_makes_message_redeliverable() {
        let queue = InMemoryQueue::new();
        queue.push(b"again".to_vec()).await;

        let batch = queue.receive(1, LEASE).await.unwrap();
        queue.abandon(&batch[0]).await.unwrap();

        let redelivered = queue.receive(1, LEASE).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].delivery_count, 2);
        assert_eq!(redelivered[0].id, batch[0].id);
    }

    #[tokio::test]
    async fn test_expired_lease_redelivers() {
        let queue = InMemoryQueue::new();
        queue.push(b"slow".to_vec()).await;

        let batch = queue
            .receive(1, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let redelivered = queue.receive(1, LEASE).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].delivery_count, 2);

        // The original lease token is now stale.
        let err = queue.complete(&batch[0]).await.unwrap_err();
        assert!(err.to_string().contains("lease"), "got: {err}");
    }

    #[tokio::test]
    async fn test_renew_extends_lease() {
        let queue = InMemoryQueue::new();
        queue.push(b"long job".to_vec()).await;

        let batch = queue
            .receive(1, Duration::from_millis(20))
            .await
            .unwrap();
        queue.renew_lease(&batch[0], LEASE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Without renewal this would have been reclaimed.
        assert!(queue.receive(1, LEASE).await.unwrap().is_empty());
        queue.complete(&batch[0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_letter_records_reason() {
        let queue = InMemoryQueue::new();
        queue.push(b"broken".to_vec()).await;

        let batch = queue.receive(1, LEASE).await.unwrap();
        queue.dead_letter(&batch[0], "payload is not valid JSON").await.unwrap();

        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "payload is not valid JSON");
        assert_eq!(dead[0].delivery_count, 1);
        assert_eq!(queue.ready_len().await, 0);
    }

    #[tokio::test]
    async fn test_receive_respects_batch_cap() {
        let queue = InMemoryQueue::new();
        for i in 0..5 {
            queue.push(format!("m{i}").into_bytes()).await;
        }

        let batch = queue.receive(2, LEASE).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.ready_len().await, 3);
    }
}
