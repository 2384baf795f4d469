//! `GraphState`: the single value threaded through every node in the compiled graph.
//!
//! One state type flows end to end — no separate Input/Output types, matching the
//! teacher's "state-in, state-out" design. Every node reads and returns a `GraphState`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

/// The node that last ran, as seen by the router. Router rule 4 (§4.1) dispatches on the
/// *family* (Planner/Executor/Verifier/Memory), so sub-variants share a family tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeId {
    Start,
    PlanningOrchestrator,
    AgentExecutor,
    TaskVerifier,
    MemoryOrchestrator,
    TaskUpdater,
    EndGraph,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::PlanningOrchestrator => "PLANNING_ORCHESTRATOR",
            Self::AgentExecutor => "AGENT_EXECUTOR",
            Self::TaskVerifier => "TASK_VERIFIER",
            Self::MemoryOrchestrator => "MEMORY_ORCHESTRATOR",
            Self::TaskUpdater => "TASK_UPDATER",
            Self::EndGraph => "END_GRAPH",
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task's place in its lifecycle. Terminal statuses (`Completed`, `Failed`, `Blocked`) are
/// sticky: once reached within a run, the task never regresses to a non-terminal status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    WaitingValidation,
    Completed,
    Failed,
    Blocked,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }
}

/// A tool available to a task, as handed to the executor's LLM call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One sub-unit of a task's plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    pub done: bool,
}

/// The unit of work produced by the Planner and consumed by the Executor/Verifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub status: TaskStatus,
    pub steps: Vec<Step>,
    pub tools: Vec<ToolSpec>,
    /// Tool-call history for this task's execution constraints (§4.6). Per-task rather than
    /// per-run: a re-planned task starts with a clean tool history.
    #[serde(default)]
    pub constraints: crate::constraints::ConstraintsState,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            status: TaskStatus::Pending,
            steps: Vec::new(),
            tools: Vec::new(),
            constraints: crate::constraints::ConstraintsState::new(),
        }
    }
}

/// A single long-term memory retrieval hit, formatted into `GraphState.memories.ltm`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub content: String,
    pub score: f32,
    pub category: Option<String>,
}

/// Short-term ring buffer of recent messages, capacity fixed at construction
/// (`AgentConfig.memory.stm_size`, default 5).
///
/// Grounded in the spec's ring-buffer description (§4.5): "indexed from `head` (newest)
/// walking backward modulo capacity; null slots skipped on format." Implemented with
/// `VecDeque` rather than a literal fixed array with null slots — `VecDeque::push_back` +
/// truncation from the front gives the same "min(N, C), insertion order preserved" behavior
/// without ever having a null slot to skip.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShortTermMemory {
    capacity: usize,
    items: VecDeque<Message>,
}

impl ShortTermMemory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.items.push_back(message);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Oldest-first view (insertion order), `min(N, capacity)` long.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops the `n` oldest items. Used by the executor's token-limit recovery (§4.3): trim
    /// and retry once rather than fail the step outright.
    pub fn trim_oldest(&mut self, n: usize) {
        for _ in 0..n {
            if self.items.pop_front().is_none() {
                break;
            }
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Memories {
    pub stm: ShortTermMemory,
    pub ltm: Vec<SimilarityHit>,
}

/// One-shot router override. Set by a node that needs to bypass the normal routing rules
/// (e.g. the executor jumping straight to the planner on `blocked_task`); `goto` is cleared
/// by the router the moment it's consumed (§4.1 rule 3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SkipValidation {
    pub skip: bool,
    pub goto: Option<NodeId>,
}

/// Recorded failure. Presence terminates the run at the next router decision unless
/// `kind == BlockedTask`, which instead routes back to the planner (§4.1 rule 1, §7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateError {
    pub kind: ErrorKind,
    pub source: String,
    pub message: String,
    pub ts: String,
}

/// Data-only mirror of `AgentError`'s kind tags, carried in `GraphState.error` and the wire
/// event's `error` object. Distinct from `AgentError` (§7's Rust realization note): this is
/// state/wire data, not a `std::error::Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigInvalid,
    AccessDenied,
    StepLimitExceeded,
    TokenLimit,
    ToolBlocked,
    BlockedTask,
    MemoryIngestFailed,
    MemoryRetrieveFailed,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// The wire-facing tag (`error.kind` in §7), matching `AgentError::kind_tag`'s strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "config_invalid",
            Self::AccessDenied => "access_denied",
            Self::StepLimitExceeded => "step_limit_exceeded",
            Self::TokenLimit => "token_limit",
            Self::ToolBlocked => "tool_blocked",
            Self::BlockedTask => "blocked_task",
            Self::MemoryIngestFailed => "memory_ingest_failed",
            Self::MemoryRetrieveFailed => "memory_retrieve_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl From<&crate::error::AgentError> for ErrorKind {
    fn from(e: &crate::error::AgentError) -> Self {
        use crate::error::AgentError as E;
        match e {
            E::ConfigInvalid(_) => Self::ConfigInvalid,
            E::AccessDenied(_) => Self::AccessDenied,
            E::StepLimitExceeded { .. } => Self::StepLimitExceeded,
            E::TokenLimit(_) => Self::TokenLimit,
            E::ToolBlocked(_) => Self::ToolBlocked,
            E::BlockedTask(_) => Self::BlockedTask,
            E::MemoryIngestFailed(_) => Self::MemoryIngestFailed,
            E::MemoryRetrieveFailed(_) => Self::MemoryRetrieveFailed,
            E::Timeout(_) => Self::Timeout,
            E::Cancelled => Self::Cancelled,
            E::Internal(_) => Self::Internal,
        }
    }
}

/// The single state value threaded through the compiled graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphState {
    pub messages: Vec<Message>,
    pub last_node: Option<NodeId>,
    pub memories: Memories,
    pub rag: String,
    pub tasks: Vec<Task>,
    pub current_task_index: usize,
    pub retry: u32,
    pub current_graph_step: u32,
    pub skip_validation: SkipValidation,
    pub error: Option<StateError>,
    /// Count of `messages` already folded into long-term memory by the memory orchestrator
    /// (§4.5 ingest phase); everything past this index is "new since last ingest".
    #[serde(default)]
    pub ltm_ingested_count: usize,
}

impl Default for NodeId {
    fn default() -> Self {
        Self::Start
    }
}

impl GraphState {
    /// The task the graph is currently working on, if any tasks exist.
    ///
    /// Invariant (§8): `0 ≤ current_task_index < tasks.len()` whenever `tasks` is non-empty.
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_task_index)
    }

    pub fn current_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.get_mut(self.current_task_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_term_memory_keeps_min_n_capacity_items_in_order() {
        let mut stm = ShortTermMemory::with_capacity(3);
        for i in 0..5 {
            stm.push(Message::human(format!("m{i}")));
        }
        let contents: Vec<_> = stm.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn short_term_memory_under_capacity_keeps_all() {
        let mut stm = ShortTermMemory::with_capacity(5);
        stm.push(Message::human("a"));
        stm.push(Message::human("b"));
        assert_eq!(stm.len(), 2);
    }

    #[test]
    fn current_task_respects_index_invariant() {
        let mut state = GraphState::default();
        assert!(state.current_task().is_none());
        state.tasks.push(Task::new("t1", "do thing"));
        assert_eq!(state.current_task().unwrap().id, "t1");
    }

    #[test]
    fn task_status_terminal_classification() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::WaitingValidation.is_terminal());
    }

    #[test]
    fn node_id_as_str_matches_wire_names() {
        assert_eq!(NodeId::AgentExecutor.as_str(), "AGENT_EXECUTOR");
        assert_eq!(NodeId::EndGraph.to_string(), "END_GRAPH");
    }
}
