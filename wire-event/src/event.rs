//! Protocol-level event types: the payload half of the event wire shape.
//!
//! The engine's graph runtime emits one of these per observable transition
//! (`on_chat_model_start/stream/end`, `on_chain_end`, `on_error`). [`Envelope`]
//! carries the run-scoped fields (`run_id`, `thread_id`, `checkpoint_id`, `from`, `ts`,
//! `metadata`) that are merged in separately so the engine crate never has to thread
//! them through every node implementation.

use serde::Serialize;
use serde_json::Value;

/// One event emitted by the graph runtime, tagged by `event` on the wire.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// A node is about to invoke the LLM.
    OnChatModelStart { tools: Option<Vec<String>> },
    /// Incremental content token or tool-call argument chunk.
    OnChatModelStream { content: String },
    /// The LLM call returned: final content, tool calls, and usage.
    OnChatModelEnd {
        content: String,
        tool_calls: Vec<ToolCallWire>,
        tokens: Option<TokensWire>,
    },
    /// The graph reached a terminal node (`metadata.final` distinguishes a true end).
    /// `error` is populated when the run ended on a fatal `GraphState.error` (e.g.
    /// `step_limit_exceeded`) rather than ordinary task completion (§7: "no partial
    /// success is reported as success").
    OnChainEnd {
        plan: Option<Value>,
        error: Option<ErrorWire>,
    },
    /// Fatal error; the stream closes after this event.
    OnError { kind: String, message: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolCallWire {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// `{kind, message}` embedded in a terminal `on_chain_end` when the run ended on an error
/// rather than normal completion (§7).
#[derive(Clone, Debug, Serialize)]
pub struct ErrorWire {
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokensWire {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl ProtocolEvent {
    /// Serializes the event payload only (no envelope or metadata).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
