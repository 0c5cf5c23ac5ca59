//! Explicit per-analysis context.
//!
//! Every orchestrator call receives the tenant, correlation ID, and a
//! cancellation signal as an explicit argument instead of reading ambient
//! state. The cancellation signal is tied to the queue message lease: when
//! the lease lapses or the worker shuts down, in-flight collaborator calls
//! stop promptly instead of racing a redelivered duplicate.

use tokio::sync::watch;

use crate::error::{AnalysisError, DriftwatchError, Result};

/// Cancellation signal shared between a message lease and its analysis.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    /// Receives `true` once cancellation is requested.
    receiver: watch::Receiver<bool>,
    /// Keeps the channel open for signals without an owning handle.
    _keepalive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

/// Owning side of a [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    /// Sends the cancellation flag.
    sender: watch::Sender<bool>,
}

/// Creates a linked cancellation handle/signal pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle { sender },
        CancelSignal {
            receiver,
            _keepalive: None,
        },
    )
}

impl CancelHandle {
    /// Requests cancellation of all linked signals.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    /// Returns a new signal linked to this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.sender.subscribe(),
            _keepalive: None,
        }
    }
}

impl CancelSignal {
    /// Returns a signal that can never fire, for callers without a lease.
    #[must_use]
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            receiver,
            _keepalive: Some(std::sync::Arc::new(sender)),
        }
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&mut self) {
        // An error means the handle was dropped without cancelling; treat
        // that as "never cancelled" and park forever.
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Context for one logical analysis attempt.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Tenant that owns the analysis.
    pub tenant_id: String,
    /// Correlation ID tying queue, processing, and notification together.
    pub correlation_id: String,
    /// Cancellation signal tied to the message lease.
    pub cancel: CancelSignal,
}

impl AnalysisContext {
    /// Creates a new analysis context.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            correlation_id: correlation_id.into(),
            cancel,
        }
    }

    /// Returns an error if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Cancelled`] once the signal has fired.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DriftwatchError::Analysis(AnalysisError::Cancelled {
                correlation_id: self.correlation_id.clone(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_starts_uncancelled() {
        let (_handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_cancel_reaches_all_signals() {
        let (handle, signal) = cancel_pair();
        let second = handle.signal();
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_never_signal_stays_quiet() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_context_ensure_active() {
        let (handle, signal) = cancel_pair();
        let ctx = AnalysisContext::new("tenant-a", "corr-1", signal);
        assert!(ctx.ensure_active().is_ok());
        handle.cancel();
        assert!(ctx.ensure_active().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (handle, mut signal) = cancel_pair();
        handle.cancel();
        signal.cancelled().await;
    }
}
