//! Internal streaming types for graph runs.
//!
//! Defines stream modes, events, and `StreamWriter` for value, update, message, and custom
//! streaming. Used by `CompiledStateGraph::stream` and nodes that emit incremental results.
//! At the dispatcher boundary these are bridged into `wire_event::ProtocolEvent` for the
//! external wire shape (§6); the richer internal event set stays process-local.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A writer for emitting custom streaming events from tools (state-agnostic).
#[derive(Clone)]
pub struct ToolStreamWriter {
    emit_fn: Arc<dyn Fn(Value) -> bool + Send + Sync>,
}

impl ToolStreamWriter {
    pub fn new(emit_fn: impl Fn(Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            emit_fn: Arc::new(emit_fn),
        }
    }

    pub fn noop() -> Self {
        Self {
            emit_fn: Arc::new(|_| false),
        }
    }

    pub fn emit_custom(&self, value: Value) -> bool {
        (self.emit_fn)(value)
    }
}

impl Debug for ToolStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStreamWriter").field("emit_fn", &"<fn>").finish()
    }
}

impl Default for ToolStreamWriter {
    fn default() -> Self {
        Self::noop()
    }
}

/// Stream mode selector: which kinds of events to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Emit full state after each node completes.
    Values,
    /// Emit incremental updates with node id and state.
    Updates,
    /// Emit message chunks (LLM streaming).
    Messages,
    /// Emit custom JSON payloads from nodes or tools.
    Custom,
    /// Emit checkpoint events when checkpoints are created.
    Checkpoints,
    /// Emit task start/end events for each node execution.
    Tasks,
    /// Emit tool-call start/end events (accepted/rejected by constraints, result).
    Tools,
    /// Emit both checkpoints and tasks events (debug mode).
    Debug,
}

/// Metadata attached to streamed messages.
#[derive(Clone, Debug)]
pub struct StreamMetadata {
    /// Id of the node that produced the message.
    pub node_id: String,
}

/// Checkpoint event emitted when a checkpoint is created.
#[derive(Clone, Debug)]
pub struct CheckpointEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub checkpoint_id: String,
    pub timestamp: String,
    pub step: i64,
    pub state: S,
    pub thread_id: Option<String>,
    pub checkpoint_ns: Option<String>,
}

/// One chunk of streamed message content.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    pub content: String,
}

/// Adapter that converts `MessageChunk` into `StreamEvent::Messages` and sends to `stream_tx`.
pub struct ChunkToStreamSender<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    stream_tx: mpsc::Sender<StreamEvent<S>>,
    node_id: String,
}

impl<S> ChunkToStreamSender<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(stream_tx: mpsc::Sender<StreamEvent<S>>, node_id: impl Into<String>) -> Self {
        Self {
            stream_tx,
            node_id: node_id.into(),
        }
    }

    pub fn channel(&self) -> (mpsc::Sender<MessageChunk>, mpsc::Receiver<MessageChunk>) {
        mpsc::channel::<MessageChunk>(128)
    }

    pub async fn forward(&self, mut chunk_rx: mpsc::Receiver<MessageChunk>) {
        let stream_tx = self.stream_tx.clone();
        let node_id = self.node_id.clone();
        while let Some(chunk) = chunk_rx.recv().await {
            let event = StreamEvent::Messages {
                chunk,
                metadata: StreamMetadata { node_id: node_id.clone() },
            };
            let _ = stream_tx.send(event).await;
        }
    }
}

/// A tool call accepted or rejected by constraints, and (if accepted) its result.
#[derive(Clone, Debug)]
pub struct ToolCallEvent {
    pub tool_name: String,
    pub accepted: bool,
    pub reason: Option<String>,
}

/// Streamed event emitted while running a graph.
#[derive(Clone, Debug)]
pub enum StreamEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Full state snapshot after a node finishes.
    Values(S),
    /// Incremental update with the node id and state after that node.
    Updates { node_id: String, state: S },
    /// Message chunk emitted by a node (e.g. the executor streaming LLM output).
    Messages {
        chunk: MessageChunk,
        metadata: StreamMetadata,
    },
    /// Custom JSON payload for arbitrary streaming data.
    Custom(Value),
    /// Checkpoint event emitted when a checkpoint is created.
    Checkpoint(CheckpointEvent<S>),
    /// Task start event emitted when a node begins execution.
    TaskStart { node_id: String },
    /// Task end event emitted when a node finishes execution.
    TaskEnd { node_id: String, result: Result<(), String> },
    /// A tool call was accepted/rejected by constraints (and, if accepted, executed).
    Tool(ToolCallEvent),
    /// LLM token usage for the last completion.
    Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
    },
    /// A node is about to invoke the LLM (bridges to `on_chat_model_start`, §4.1).
    ChatModelStart { tools: Option<Vec<String>>, node_id: String },
    /// A non-fatal error the node recovered from (e.g. executor token-limit trim-and-retry,
    /// §4.3/§8 scenario 4); bridges to a non-final `on_error`. The stream stays open.
    RecoverableError { kind: String, message: String, node_id: String },
    /// Fatal error; the stream closes after this event.
    Error { kind: String, message: String },
}

/// A writer for emitting streaming events from nodes and tools.
#[derive(Clone)]
pub struct StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    tx: Option<mpsc::Sender<StreamEvent<S>>>,
    modes: Arc<HashSet<StreamMode>>,
}

impl<S> StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(tx: Option<mpsc::Sender<StreamEvent<S>>>, modes: HashSet<StreamMode>) -> Self {
        Self {
            tx,
            modes: Arc::new(modes),
        }
    }

    pub fn noop() -> Self {
        Self {
            tx: None,
            modes: Arc::new(HashSet::new()),
        }
    }

    pub fn is_mode_enabled(&self, mode: StreamMode) -> bool {
        self.modes.contains(&mode)
    }

    pub async fn emit_custom(&self, value: Value) -> bool {
        if !self.modes.contains(&StreamMode::Custom) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(StreamEvent::Custom(value)).await.is_ok(),
            None => false,
        }
    }

    pub fn try_emit_custom(&self, value: Value) -> bool {
        if !self.modes.contains(&StreamMode::Custom) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.try_send(StreamEvent::Custom(value)).is_ok(),
            None => false,
        }
    }

    pub async fn emit_message(&self, content: impl Into<String>, node_id: impl Into<String>) -> bool {
        if !self.modes.contains(&StreamMode::Messages) {
            return false;
        }
        match &self.tx {
            Some(tx) => {
                let event = StreamEvent::Messages {
                    chunk: MessageChunk { content: content.into() },
                    metadata: StreamMetadata { node_id: node_id.into() },
                };
                tx.send(event).await.is_ok()
            }
            None => false,
        }
    }

    pub async fn emit_values(&self, state: S) -> bool {
        if !self.modes.contains(&StreamMode::Values) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(StreamEvent::Values(state)).await.is_ok(),
            None => false,
        }
    }

    pub async fn emit_updates(&self, node_id: impl Into<String>, state: S) -> bool {
        if !self.modes.contains(&StreamMode::Updates) {
            return false;
        }
        match &self.tx {
            Some(tx) => {
                tx.send(StreamEvent::Updates { node_id: node_id.into(), state }).await.is_ok()
            }
            None => false,
        }
    }

    pub async fn emit_checkpoint(
        &self,
        checkpoint_id: impl Into<String>,
        timestamp: impl Into<String>,
        step: i64,
        state: S,
        thread_id: Option<String>,
        checkpoint_ns: Option<String>,
    ) -> bool {
        if !self.modes.contains(&StreamMode::Checkpoints) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        match &self.tx {
            Some(tx) => {
                let event = StreamEvent::Checkpoint(CheckpointEvent {
                    checkpoint_id: checkpoint_id.into(),
                    timestamp: timestamp.into(),
                    step,
                    state,
                    thread_id,
                    checkpoint_ns,
                });
                tx.send(event).await.is_ok()
            }
            None => false,
        }
    }

    pub async fn emit_task_start(&self, node_id: impl Into<String>) -> bool {
        if !self.modes.contains(&StreamMode::Tasks) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(StreamEvent::TaskStart { node_id: node_id.into() }).await.is_ok(),
            None => false,
        }
    }

    pub async fn emit_task_end(&self, node_id: impl Into<String>, result: Result<(), String>) -> bool {
        if !self.modes.contains(&StreamMode::Tasks) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(StreamEvent::TaskEnd { node_id: node_id.into(), result }).await.is_ok(),
            None => false,
        }
    }

    pub async fn emit_tool(&self, tool_name: impl Into<String>, accepted: bool, reason: Option<String>) -> bool {
        if !self.modes.contains(&StreamMode::Tools) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx
                .send(StreamEvent::Tool(ToolCallEvent {
                    tool_name: tool_name.into(),
                    accepted,
                    reason,
                }))
                .await
                .is_ok(),
            None => false,
        }
    }

    pub async fn emit_model_start(&self, tools: Option<Vec<String>>, node_id: impl Into<String>) -> bool {
        if !self.modes.contains(&StreamMode::Messages) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx
                .send(StreamEvent::ChatModelStart { tools, node_id: node_id.into() })
                .await
                .is_ok(),
            None => false,
        }
    }

    pub async fn emit_recoverable_error(
        &self,
        kind: impl Into<String>,
        message: impl Into<String>,
        node_id: impl Into<String>,
    ) -> bool {
        if !self.modes.contains(&StreamMode::Messages) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx
                .send(StreamEvent::RecoverableError {
                    kind: kind.into(),
                    message: message.into(),
                    node_id: node_id.into(),
                })
                .await
                .is_ok(),
            None => false,
        }
    }

    pub fn sender(&self) -> Option<&mpsc::Sender<StreamEvent<S>>> {
        self.tx.as_ref()
    }

    pub fn modes(&self) -> &HashSet<StreamMode> {
        &self.modes
    }
}

impl<S> Debug for StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("has_sender", &self.tx.is_some())
            .field("modes", &self.modes)
            .finish()
    }
}
