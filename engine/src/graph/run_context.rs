//! Per-run context handed to nodes: streaming, store access, and cooperative cancellation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::memory::{RunnableConfig, Store};
use crate::stream::{StreamEvent, StreamMode, StreamWriter};

/// Cooperative cancellation flag for one thread's run. Checked before each node invocation
/// and at LLM/tool suspension points (§5). Hand-rolled rather than pulling in `tokio-util`:
/// an `AtomicBool` plus a `Notify` covers both the poll and the wake-on-cancel cases this
/// engine actually needs.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` is called (or immediately if already cancelled).
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Context passed to `Node::run_with_context`: run config, streaming, store, cancellation.
pub struct RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub config: RunnableConfig,
    pub store: Option<Arc<dyn Store>>,
    pub stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
    pub stream_modes: std::collections::HashSet<StreamMode>,
    pub cancel: CancelToken,
}

impl<S> RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(config: RunnableConfig) -> Self {
        Self {
            config,
            store: None,
            stream_tx: None,
            stream_modes: std::collections::HashSet::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_stream(
        mut self,
        tx: mpsc::Sender<StreamEvent<S>>,
        modes: std::collections::HashSet<StreamMode>,
    ) -> Self {
        self.stream_tx = Some(tx);
        self.stream_modes = modes;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A `StreamWriter` bound to this context's sender and enabled modes.
    pub fn stream_writer(&self) -> StreamWriter<S> {
        StreamWriter::new(self.stream_tx.clone(), self.stream_modes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_token_resolves_cancelled_future_after_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn run_context_defaults_have_no_stream_or_store() {
        let ctx: RunContext<i32> = RunContext::new(RunnableConfig::default());
        assert!(ctx.store.is_none());
        assert!(ctx.stream_tx.is_none());
        assert!(!ctx.cancel.is_cancelled());
    }
}
