//! Request Dispatcher (§4.8): the engine's one transport-agnostic front door. Loads config,
//! acquires (or builds) a cached compiled graph, drives one turn to completion, and bridges
//! the internal event stream into `wire_event::ProtocolEvent`s for the caller.
//!
//! Kept deliberately thin: everything it does is compose `AgentDirectory`, `RuntimeCache`,
//! and `nodes::build_graph` — all grounded elsewhere — rather than reimplement any of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::agent_directory::{AgentDirectory, AgentDirectoryError};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::CancelToken;
use crate::memory::{Checkpointer, RunnableConfig};
use crate::message::Message;
use crate::nodes::{self, GraphDeps};
use crate::runner_common::load_from_checkpoint_or_build;
use crate::runtime_cache::{CacheLease, RebuildFn, RuntimeCache};
use crate::state::{GraphState, NodeId, TaskStatus};
use crate::stream::{StreamEvent, StreamMode};

use wire_event::{to_json, Envelope, ErrorWire, ProtocolEvent, RunMetadata, TokensWire, ToolCallWire};

/// One user turn: the human message plus the optional human-in-the-loop approval threshold
/// (§6 `request: {content, hitl_threshold?}`).
#[derive(Clone, Debug)]
pub struct ExecuteRequest {
    pub content: String,
    pub hitl_threshold: Option<f32>,
}

impl ExecuteRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            hitl_threshold: None,
        }
    }
}

/// Response to `get_state` (§6): a read-only snapshot, not a full `GraphState` — callers
/// outside the engine see only what the wire shape already exposes elsewhere.
#[derive(Clone, Debug)]
pub struct StateSummary {
    pub last_node: Option<NodeId>,
    pub current_graph_step: u32,
    pub task_statuses: Vec<(String, TaskStatus)>,
}

/// Builds the `GraphDeps` a compiled graph needs from a freshly loaded `AgentConfig`. Owned
/// by the host application (it knows how to construct a real `LlmClient`/`ToolSource`); the
/// dispatcher only calls it.
pub type DepsFactory = Arc<dyn Fn(&AgentConfig) -> GraphDeps + Send + Sync>;

fn rebuild_fn_for(
    directory: Arc<dyn AgentDirectory>,
    deps_factory: DepsFactory,
    agent_id: String,
    user_id: String,
) -> RebuildFn {
    Arc::new(move || {
        let directory = directory.clone();
        let deps_factory = deps_factory.clone();
        let agent_id = agent_id.clone();
        let user_id = user_id.clone();
        Box::pin(async move {
            let config = directory
                .load_agent(&agent_id, &user_id)
                .await
                .map_err(|e| e.to_string())?;
            let deps = (deps_factory)(&config);
            nodes::build_graph(&config, deps).map_err(|e| e.to_string())
        })
    })
}

/// Pools compiled graphs behind an `AgentDirectory`/`DepsFactory` pair and drives runs.
pub struct Dispatcher {
    directory: Arc<dyn AgentDirectory>,
    checkpointer: Arc<dyn Checkpointer<GraphState>>,
    cache: Arc<RuntimeCache>,
    deps_factory: DepsFactory,
    cache_ttl: Option<Duration>,
    active_runs: Arc<DashMap<(String, String), CancelToken>>,
    next_run_id: AtomicU64,
}

impl Dispatcher {
    /// `checkpointer` here is the same instance the `deps_factory` threads into each built
    /// graph's `GraphDeps.checkpointer`, so `get_state` can read the latest checkpoint
    /// without the dispatcher reaching back into a live `CompiledStateGraph` (§9: a compiled
    /// graph exposes no checkpointer getter, by design — it's a compile-time dependency, not
    /// a runtime one).
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        checkpointer: Arc<dyn Checkpointer<GraphState>>,
        deps_factory: DepsFactory,
        max_cache_entries: usize,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            directory,
            checkpointer,
            cache: Arc::new(RuntimeCache::new(max_cache_entries)),
            deps_factory,
            cache_ttl,
            active_runs: Arc::new(DashMap::new()),
            next_run_id: AtomicU64::new(1),
        }
    }

    fn run_id(&self) -> String {
        format!("run-{}", self.next_run_id.fetch_add(1, Ordering::SeqCst))
    }

    /// §4.8 steps 1-2: load config, then acquire a matching cache entry or build one.
    async fn acquire_or_build(
        &self,
        agent_id: &str,
        user_id: &str,
    ) -> Result<(CacheLease, AgentConfig), AgentError> {
        let config = self.directory.load_agent(agent_id, user_id).await.map_err(|e| match e {
            AgentDirectoryError::AccessDenied { .. } => AgentError::AccessDenied(e.to_string()),
            AgentDirectoryError::NotFound(_) => AgentError::ConfigInvalid(e.to_string()),
            AgentDirectoryError::Storage(_) => AgentError::Internal(e.to_string()),
        })?;
        config
            .validate()
            .map_err(|e| AgentError::ConfigInvalid(e.to_string()))?;

        if let Some(lease) = self.cache.acquire(agent_id).await {
            if lease.cfg_version() == config.cfg_version {
                return Ok((lease, config));
            }
            drop(lease);
            self.cache.invalidate(agent_id, config.cfg_version).await?;
            let lease = self
                .cache
                .acquire(agent_id)
                .await
                .ok_or_else(|| AgentError::Internal(format!("agent {agent_id} vanished from cache after invalidate")))?;
            return Ok((lease, config));
        }

        let deps = (self.deps_factory)(&config);
        let graph = nodes::build_graph(&config, deps)?;
        let rebuild_fn = rebuild_fn_for(
            self.directory.clone(),
            self.deps_factory.clone(),
            agent_id.to_string(),
            user_id.to_string(),
        );
        self.cache
            .seed(agent_id, user_id, config.cfg_version, graph, rebuild_fn, self.cache_ttl)
            .await;
        let lease = self
            .cache
            .acquire(agent_id)
            .await
            .ok_or_else(|| AgentError::Internal(format!("agent {agent_id} vanished from cache after seed")))?;
        Ok((lease, config))
    }

    /// Runs one turn (§4.8 steps 3-5) and returns a channel of wire-shaped JSON events. The
    /// returned receiver closes once the run reaches a terminal `on_chain_end` or errors.
    pub async fn execute(
        &self,
        agent_id: &str,
        user_id: &str,
        thread_id: &str,
        request: ExecuteRequest,
    ) -> Result<mpsc::Receiver<serde_json::Value>, AgentError> {
        let (lease, config) = self.acquire_or_build(agent_id, user_id).await?;

        let cancel = CancelToken::new();
        self.active_runs
            .insert((agent_id.to_string(), thread_id.to_string()), cancel.clone());

        let run_config = RunnableConfig {
            thread_id: Some(thread_id.to_string()),
            user_id: Some(user_id.to_string()),
            ..Default::default()
        };

        let content = request.content.clone();
        let initial_state = load_from_checkpoint_or_build(
            Some(self.checkpointer.as_ref()),
            Some(&run_config),
            &content,
            async {
                let mut state = GraphState::default();
                state.messages.push(Message::human(content.clone()));
                Ok(state)
            },
            |mut state, message| {
                state.messages.push(Message::human(message));
                state
            },
        )
        .await
        .map_err(AgentError::from)?;

        let (out_tx, out_rx) = mpsc::channel(256);
        let run_id = self.run_id();
        let agent_id = agent_id.to_string();
        let user_id = user_id.to_string();
        let thread_id = thread_id.to_string();
        let execution_mode = match config.graph.execution_mode {
            crate::config::ExecutionMode::Reactive => "reactive",
            crate::config::ExecutionMode::Planned => "planned",
        }
        .to_string();
        let model_name = config.graph.model_refs.first().cloned().unwrap_or_default();
        let directory = self.directory.clone();
        let active_runs = self.active_runs.clone();

        tokio::spawn(async move {
            run_and_bridge(
                lease,
                initial_state,
                run_config,
                cancel,
                run_id,
                agent_id.clone(),
                user_id,
                thread_id.clone(),
                execution_mode,
                model_name,
                directory,
                out_tx,
            )
            .await;
            active_runs.remove(&(agent_id, thread_id));
        });

        Ok(out_rx)
    }

    /// Cooperative cancellation (§5): looks up the thread's token and signals it. A no-op if
    /// no run is in flight for `(agent_id, thread_id)`.
    pub fn cancel(&self, agent_id: &str, thread_id: &str) {
        if let Some(token) = self.active_runs.get(&(agent_id.to_string(), thread_id.to_string())) {
            token.cancel();
        }
    }

    /// §6 `get_state(agent_id, thread_id) -> {state_summary, checkpoint_id}`.
    pub async fn get_state(
        &self,
        agent_id: &str,
        thread_id: &str,
    ) -> Result<(StateSummary, Option<String>), AgentError> {
        let config = RunnableConfig {
            thread_id: Some(thread_id.to_string()),
            ..Default::default()
        };
        let tuple = self
            .checkpointer
            .get_tuple(&config)
            .await
            .map_err(AgentError::from)?;
        match tuple {
            Some((checkpoint, _metadata)) => {
                let state = checkpoint.state;
                let summary = StateSummary {
                    last_node: state.last_node,
                    current_graph_step: state.current_graph_step,
                    task_statuses: state.tasks.iter().map(|t| (t.id.clone(), t.status)).collect(),
                };
                Ok((summary, Some(checkpoint.id)))
            }
            None => Err(AgentError::Internal(format!(
                "no checkpoint for agent {agent_id} thread {thread_id}"
            ))),
        }
    }

    /// Forces the next `execute` for `agent_id` to rebuild from fresh config, bypassing the
    /// cache's own lazy `cfg_version` check (used when the host knows config changed out of
    /// band, e.g. a profile edit, rather than waiting for the next request to notice).
    pub async fn invalidate_agent(&self, agent_id: &str, user_id: &str) -> Result<(), AgentError> {
        let fresh = self.directory.load_agent(agent_id, user_id).await.map_err(|e| match e {
            AgentDirectoryError::AccessDenied { .. } => AgentError::AccessDenied(e.to_string()),
            AgentDirectoryError::NotFound(_) => AgentError::ConfigInvalid(e.to_string()),
            AgentDirectoryError::Storage(_) => AgentError::Internal(e.to_string()),
        })?;
        if !self.cache.contains(agent_id) {
            return Ok(());
        }
        self.cache.invalidate(agent_id, fresh.cfg_version).await?;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_and_bridge(
    lease: CacheLease,
    initial_state: GraphState,
    run_config: RunnableConfig,
    cancel: CancelToken,
    run_id: String,
    agent_id: String,
    user_id: String,
    thread_id: String,
    execution_mode: String,
    model_name: String,
    directory: Arc<dyn AgentDirectory>,
    out_tx: mpsc::Sender<serde_json::Value>,
) {
    let modes = [
        StreamMode::Messages,
        StreamMode::Updates,
        StreamMode::Values,
    ]
    .into_iter()
    .collect();

    let graph = lease.graph().clone();
    let mut stream = graph.stream_with_cancel(initial_state, Some(run_config), modes, cancel);

    let mut seen_messages = 0usize;
    let mut checkpoint_id: Option<String> = None;

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Messages { chunk, metadata } => {
                let envelope = envelope(&run_id, &thread_id, checkpoint_id.clone(), &metadata.node_id);
                let metadata = run_metadata(&metadata.node_id, &execution_mode, &model_name, None, false);
                let wire = ProtocolEvent::OnChatModelStream { content: chunk.content };
                send_event(&out_tx, &wire, &envelope, &metadata).await;
            }
            StreamEvent::Updates { node_id, state } => {
                if let Some(last) = state.messages.get(seen_messages..).and_then(|tail| tail.last()) {
                    if last.role == crate::message::Role::Ai && !last.content.is_empty() {
                        let _ = directory
                            .insert_message(&agent_id, &user_id, &thread_id, last)
                            .await;

                        let envelope = envelope(&run_id, &thread_id, checkpoint_id.clone(), &node_id);
                        let metadata = run_metadata(&node_id, &execution_mode, &model_name, None, false);
                        let wire = ProtocolEvent::OnChatModelEnd {
                            content: last.content.clone(),
                            tool_calls: last
                                .tool_calls
                                .iter()
                                .map(|c| ToolCallWire {
                                    id: c.id.clone(),
                                    name: c.name.clone(),
                                    arguments: c.arguments.clone(),
                                })
                                .collect(),
                            tokens: None,
                        };
                        send_event(&out_tx, &wire, &envelope, &metadata).await;
                    }
                }
                seen_messages = state.messages.len();

                if node_id == NodeId::EndGraph.as_str() {
                    let envelope = envelope(&run_id, &thread_id, checkpoint_id.clone(), &node_id);
                    let metadata = run_metadata(&node_id, &execution_mode, &model_name, None, true);
                    let error = state.error.as_ref().map(|e| ErrorWire {
                        kind: e.kind.as_str().to_string(),
                        message: e.message.clone(),
                    });
                    let wire = ProtocolEvent::OnChainEnd { plan: None, error };
                    send_event(&out_tx, &wire, &envelope, &metadata).await;
                }
            }
            StreamEvent::Checkpoint(cp) => {
                checkpoint_id = Some(cp.checkpoint_id);
            }
            StreamEvent::ChatModelStart { tools, node_id } => {
                let envelope = envelope(&run_id, &thread_id, checkpoint_id.clone(), &node_id);
                let metadata = run_metadata(&node_id, &execution_mode, &model_name, None, false);
                let wire = ProtocolEvent::OnChatModelStart { tools };
                send_event(&out_tx, &wire, &envelope, &metadata).await;
            }
            StreamEvent::RecoverableError { kind, message, node_id } => {
                let envelope = envelope(&run_id, &thread_id, checkpoint_id.clone(), &node_id);
                let metadata = run_metadata(&node_id, &execution_mode, &model_name, None, false);
                let wire = ProtocolEvent::OnError { kind, message };
                send_event(&out_tx, &wire, &envelope, &metadata).await;
            }
            StreamEvent::Error { kind, message } => {
                let envelope = envelope(&run_id, &thread_id, checkpoint_id.clone(), "");
                let metadata = run_metadata("", &execution_mode, &model_name, None, true);
                let wire = ProtocolEvent::OnError { kind, message };
                send_event(&out_tx, &wire, &envelope, &metadata).await;
            }
            // Internal-only: Values/TaskStart/TaskEnd/Tool/Usage/Custom never cross the wire.
            _ => {}
        }
    }
}

fn envelope(run_id: &str, thread_id: &str, checkpoint_id: Option<String>, from: &str) -> Envelope {
    let ts = chrono::Utc::now().to_rfc3339();
    let mut e = Envelope::new(run_id.to_string(), thread_id.to_string(), ts).with_from(from.to_string());
    if let Some(id) = checkpoint_id {
        e = e.with_checkpoint_id(id);
    }
    e
}

fn run_metadata(
    node_id: &str,
    execution_mode: &str,
    model_name: &str,
    tokens: Option<TokensWire>,
    is_final: bool,
) -> RunMetadata {
    RunMetadata {
        conversation_id: None,
        langgraph_step: 0,
        langgraph_node: node_id.to_string(),
        tokens,
        is_final,
        execution_mode: execution_mode.to_string(),
        ls_provider: "mock".to_string(),
        ls_model_name: model_name.to_string(),
        ls_model_type: "chat".to_string(),
        ls_temperature: 0.0,
    }
}

async fn send_event(
    out_tx: &mpsc::Sender<serde_json::Value>,
    event: &ProtocolEvent,
    envelope: &Envelope,
    metadata: &RunMetadata,
) {
    if let Ok(value) = to_json(event, envelope, metadata) {
        let _ = out_tx.send(value).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_directory::InMemoryAgentDirectory;
    use crate::config::{AgentMode, ExecutionMode, GraphConfig, MemoryConfig, RagConfig, RetryConfig};
    use crate::constraints::ExecutionConstraints;
    use crate::llm::MockLlm;
    use crate::memory::{InMemoryStore, MemorySaver};
    use crate::tools::{CalculatorTool, EndTaskTool, StaticToolSource};
    use std::sync::Arc as StdArc;

    fn sample_config(max_graph_steps: u32) -> AgentConfig {
        AgentConfig {
            id: "agent-1".into(),
            user_id: "user-1".into(),
            profile: "default".into(),
            mode: AgentMode::Autonomous,
            graph: GraphConfig {
                model_refs: vec!["mock-1".into()],
                execution_mode: ExecutionMode::Planned,
                max_graph_steps,
            },
            memory: MemoryConfig::default(),
            rag: RagConfig::default(),
            retries: RetryConfig::default(),
            tools: vec!["calculator".into(), "end_task".into()],
            prompts: Default::default(),
            cfg_version: 1,
        }
    }

    fn deps_factory() -> DepsFactory {
        Arc::new(|_config: &AgentConfig| GraphDeps {
            llm: Arc::new(MockLlm::fixed("no further action")),
            tools: Arc::new(StaticToolSource::new(vec![
                StdArc::new(CalculatorTool::new()),
                StdArc::new(EndTaskTool::new()),
            ])),
            store: Arc::new(InMemoryStore::new()),
            checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
            constraints: ExecutionConstraints::default(),
        })
    }

    /// Builds a dispatcher sharing one `MemorySaver` between `deps_factory`'s per-agent
    /// checkpointer and the dispatcher's own, matching `Dispatcher::new`'s doc comment.
    fn dispatcher_with(config: AgentConfig) -> (Dispatcher, Arc<InMemoryAgentDirectory>) {
        let directory = Arc::new(InMemoryAgentDirectory::new());
        directory.put_config(config);
        let checkpointer: Arc<dyn Checkpointer<GraphState>> = Arc::new(MemorySaver::<GraphState>::new());
        let shared_checkpointer = checkpointer.clone();
        let factory: DepsFactory = Arc::new(move |_config: &AgentConfig| GraphDeps {
            llm: Arc::new(MockLlm::fixed("no further action")),
            tools: Arc::new(StaticToolSource::new(vec![
                StdArc::new(CalculatorTool::new()),
                StdArc::new(EndTaskTool::new()),
            ])),
            store: Arc::new(InMemoryStore::new()),
            checkpointer: shared_checkpointer.clone(),
            constraints: ExecutionConstraints::default(),
        });
        let dispatcher = Dispatcher::new(directory.clone(), checkpointer, factory, 16, None);
        (dispatcher, directory)
    }

    #[tokio::test]
    async fn execute_denies_wrong_owner() {
        let (dispatcher, _directory) = dispatcher_with(sample_config(10));
        let err = dispatcher
            .execute("agent-1", "not-the-owner", "t1", ExecuteRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn execute_runs_to_a_terminal_on_chain_end() {
        // A low `max_graph_steps` forces termination deterministically: the mock LLM never
        // calls `end_task`, so the plan/execute/verify loop would otherwise only stop at the
        // router's step-limit rule (router rule 2), not at task completion.
        let (dispatcher, _directory) = dispatcher_with(sample_config(6));
        let mut rx = dispatcher
            .execute("agent-1", "user-1", "t1", ExecuteRequest::new("hello"))
            .await
            .expect("execute starts");

        let mut saw_final = false;
        while let Some(event) = rx.recv().await {
            if event["event"] == "on_chain_end" && event["metadata"]["final"] == true {
                saw_final = true;
            }
        }
        assert!(saw_final, "expected a final on_chain_end event");
    }

    #[tokio::test]
    async fn execute_persists_ai_messages_via_directory() {
        let (dispatcher, directory) = dispatcher_with(sample_config(6));
        let mut rx = dispatcher
            .execute("agent-1", "user-1", "t1", ExecuteRequest::new("hello"))
            .await
            .expect("execute starts");
        while rx.recv().await.is_some() {}

        let messages = directory
            .get_messages("agent-1", "user-1", "t1", None, 0)
            .await
            .unwrap();
        assert!(messages.iter().any(|m| m.role == crate::message::Role::Ai));
    }

    #[tokio::test]
    async fn get_state_reflects_latest_checkpoint_after_a_run() {
        let (dispatcher, _directory) = dispatcher_with(sample_config(6));
        let mut rx = dispatcher
            .execute("agent-1", "user-1", "t1", ExecuteRequest::new("hello"))
            .await
            .expect("execute starts");
        while rx.recv().await.is_some() {}

        let (summary, checkpoint_id) = dispatcher.get_state("agent-1", "t1").await.unwrap();
        assert!(checkpoint_id.is_some());
        assert_eq!(summary.last_node, Some(NodeId::EndGraph));
    }

    #[tokio::test]
    async fn cancel_on_unknown_thread_is_a_harmless_noop() {
        let (dispatcher, _directory) = dispatcher_with(sample_config(6));
        dispatcher.cancel("agent-1", "no-such-thread");
    }

    #[tokio::test]
    async fn invalidate_agent_rebuilds_cache_entry_on_next_acquire() {
        let (dispatcher, directory) = dispatcher_with(sample_config(6));
        let mut rx = dispatcher
            .execute("agent-1", "user-1", "t1", ExecuteRequest::new("hello"))
            .await
            .expect("execute starts");
        while rx.recv().await.is_some() {}

        let mut bumped = sample_config(6);
        bumped.cfg_version = 2;
        directory.put_config(bumped);
        dispatcher.invalidate_agent("agent-1", "user-1").await.unwrap();
        assert_eq!(dispatcher.cache.cfg_version("agent-1"), Some(2));
    }
}
