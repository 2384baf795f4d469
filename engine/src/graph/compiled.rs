//! Compiled, executable state graph: `invoke` (state in, state out) and `stream`
//! (incremental events) over the node chain a `StateGraph` validated at `compile()`.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::channels::BoxedStateUpdater;
use crate::error::AgentError;
use crate::memory::{Checkpoint, CheckpointSource, Checkpointer, RunnableConfig, Store};
use crate::stream::{StreamEvent, StreamMode};

use super::conditional::NextEntry;
use super::next::Next;
use super::node::Node;
use super::node_middleware::NodeMiddleware;
use super::retry::RetryPolicy;
use super::run_context::RunContext;
use super::state_graph::END;

/// A validated, executable graph produced by `StateGraph::compile*`.
///
/// Holds the node map, the resolved linear edge order (for diagnostics), the
/// per-node next-step map (unconditional or conditional), and the optional
/// checkpointer/store/middleware/retry policy attached at compile time.
pub struct CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub(crate) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(crate) first_node_id: String,
    pub(crate) edge_order: Vec<String>,
    pub(crate) next_map: HashMap<String, NextEntry<S>>,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    pub(crate) store: Option<Arc<dyn Store>>,
    pub(crate) middleware: Option<Arc<dyn NodeMiddleware<S>>>,
    pub(crate) state_updater: BoxedStateUpdater<S>,
    pub(crate) retry_policy: RetryPolicy,
}

impl<S> Clone for CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            first_node_id: self.first_node_id.clone(),
            edge_order: self.edge_order.clone(),
            next_map: self.next_map.clone(),
            checkpointer: self.checkpointer.clone(),
            store: self.store.clone(),
            middleware: self.middleware.clone(),
            state_updater: self.state_updater.clone(),
            retry_policy: self.retry_policy.clone(),
        }
    }
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Node ids in resolved linear order (diagnostics; not meaningful once conditional
    /// edges branch the chain).
    pub fn edge_order(&self) -> &[String] {
        &self.edge_order
    }

    /// The long-term store attached at compile time, if any.
    pub fn store(&self) -> Option<&Arc<dyn Store>> {
        self.store.as_ref()
    }

    /// Runs the graph to completion: state in, state out. No streaming, no run context.
    pub async fn invoke(&self, state: S, config: Option<RunnableConfig>) -> Result<S, AgentError> {
        let ctx = RunContext::new(config.unwrap_or_default());
        self.invoke_with_context(state, ctx).await
    }

    /// Runs the graph to completion using a caller-built `RunContext` (streaming, store,
    /// cancellation already attached).
    pub async fn invoke_with_context(
        &self,
        mut state: S,
        ctx: RunContext<S>,
    ) -> Result<S, AgentError> {
        let ctx = Arc::new(if ctx.store.is_none() {
            match &self.store {
                Some(store) => ctx.with_store(store.clone()),
                None => ctx,
            }
        } else {
            ctx
        });

        let writer = ctx.stream_writer();
        let mut current_id = self.first_node_id.clone();
        let mut step: i64 = 0;

        loop {
            if ctx.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let node = self
                .nodes
                .get(&current_id)
                .cloned()
                .ok_or_else(|| AgentError::Internal(format!("node not found: {current_id}")))?;

            writer.emit_task_start(current_id.clone()).await;
            let run_result = self.run_node_with_retry(node, ctx.clone(), state.clone()).await;

            let (node_output, next) = match run_result {
                Ok(pair) => pair,
                Err(e) => {
                    writer.emit_task_end(current_id.clone(), Err(e.to_string())).await;
                    writer.emit_values(state.clone()).await;
                    return Err(e);
                }
            };
            writer.emit_task_end(current_id.clone(), Ok(())).await;

            self.state_updater.apply_update(&mut state, &node_output);
            writer.emit_updates(current_id.clone(), state.clone()).await;
            writer.emit_values(state.clone()).await;

            step += 1;

            let resolved = match next {
                Next::End => END.to_string(),
                Next::Node(id) => id,
                Next::Continue => self.resolve_next(&current_id, &state),
            };

            if resolved == END {
                break;
            }
            current_id = resolved;
        }

        if let Some(checkpointer) = &self.checkpointer {
            if ctx.config.thread_id.is_some() {
                let checkpoint = Checkpoint::from_state(state.clone(), CheckpointSource::Loop, step);
                let id = checkpointer
                    .put(&ctx.config, &checkpoint)
                    .await
                    .map_err(|e| AgentError::Internal(e.to_string()))?;
                writer
                    .emit_checkpoint(
                        id,
                        checkpoint.ts.clone(),
                        step,
                        state.clone(),
                        ctx.config.thread_id.clone(),
                        Some(ctx.config.checkpoint_ns.clone()),
                    )
                    .await;
            }
        }

        Ok(state)
    }

    /// Runs the graph, returning a stream of incremental events. The stream ends once the
    /// graph reaches `END` or a node fails; the failure (if any) is delivered as a final
    /// `StreamEvent::Error` before the channel closes.
    pub fn stream(
        &self,
        state: S,
        config: Option<RunnableConfig>,
        modes: HashSet<StreamMode>,
    ) -> ReceiverStream<StreamEvent<S>> {
        self.stream_with_cancel(state, config, modes, super::run_context::CancelToken::new())
    }

    /// Same as [`Self::stream`], but lets the caller supply a `CancelToken` up front so a
    /// run can be cancelled from outside the stream consumer (§5 "Cancellation: cooperative
    /// via a per-thread cancellation token").
    pub fn stream_with_cancel(
        &self,
        state: S,
        config: Option<RunnableConfig>,
        modes: HashSet<StreamMode>,
        cancel: super::run_context::CancelToken,
    ) -> ReceiverStream<StreamEvent<S>> {
        let (tx, rx) = mpsc::channel(256);
        let graph = self.clone();
        let ctx = RunContext::new(config.unwrap_or_default())
            .with_stream(tx.clone(), modes)
            .with_cancel(cancel);

        tokio::spawn(async move {
            if let Err(e) = graph.invoke_with_context(state, ctx).await {
                let _ = tx
                    .send(StreamEvent::Error {
                        kind: e.kind_tag().to_string(),
                        message: e.to_string(),
                    })
                    .await;
            }
        });

        ReceiverStream::new(rx)
    }

    fn resolve_next(&self, from: &str, state: &S) -> String {
        match self.next_map.get(from) {
            Some(NextEntry::Unconditional(id)) => id.clone(),
            Some(NextEntry::Conditional(router)) => router.resolve(state),
            None => END.to_string(),
        }
    }

    /// Runs one node, retrying on failure per `retry_policy`. When middleware is attached,
    /// it wraps the node's plain `run`; node.run_with_context is used directly otherwise.
    async fn run_node_with_retry(
        &self,
        node: Arc<dyn Node<S>>,
        ctx: Arc<RunContext<S>>,
        state: S,
    ) -> Result<(S, Next), AgentError> {
        let max_attempts = self.retry_policy.max_attempts().max(1);
        let mut attempt = 0;
        loop {
            let result = match &self.middleware {
                Some(mw) => {
                    let node_id = node.id().to_string();
                    let node_for_inner = node.clone();
                    mw.around_run(
                        &node_id,
                        state.clone(),
                        Box::new(move |s| Box::pin(async move { node_for_inner.run(s).await })),
                    )
                    .await
                }
                None => node.run_with_context(state.clone(), &ctx).await,
            };

            match result {
                Ok(pair) => return Ok(pair),
                Err(e) if attempt + 1 < max_attempts => {
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
