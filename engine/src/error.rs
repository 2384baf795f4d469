//! The engine's single error type.
//!
//! Every fallible operation in the crate — graph compilation, node execution,
//! checkpoint I/O, tool dispatch, cache acquisition — converges on [`AgentError`].
//! The variant names mirror the `error.kind` tags emitted on the wire (see
//! `wire_event::ProtocolEvent::OnError`); `kind_tag` returns that string directly so
//! the dispatcher never has to match on the enum a second time to build the event.

use thiserror::Error;

use crate::graph::CompilationError;
use crate::memory::{CheckpointError, StoreError};
use crate::runtime_cache::CacheError;
use crate::tool_source::ToolSourceError;

/// Errors surfaced anywhere in the agent engine.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `AgentConfig` failed validation (missing model ref, non-monotonic limits, ...).
    #[error("invalid agent config: {0}")]
    ConfigInvalid(String),

    /// The caller is not entitled to run this agent (tenant/user mismatch).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// `currentGraphStep` reached `max_graph_steps` without ending.
    #[error("step limit exceeded: {current}/{limit}")]
    StepLimitExceeded { current: u32, limit: u32 },

    /// The model provider reported a context/token limit was exceeded.
    #[error("token limit exceeded: {0}")]
    TokenLimit(String),

    /// A tool call was rejected by execution constraints.
    #[error("tool blocked: {0}")]
    ToolBlocked(String),

    /// A task was marked blocked and could not be retried further.
    #[error("blocked task: {0}")]
    BlockedTask(String),

    /// Writing to short- or long-term memory failed.
    #[error("memory ingest failed: {0}")]
    MemoryIngestFailed(String),

    /// Reading from long-term memory / RAG failed.
    #[error("memory retrieve failed: {0}")]
    MemoryRetrieveFailed(String),

    /// A bounded operation (LLM call, tool call) did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The run was cancelled by its caller.
    #[error("cancelled")]
    Cancelled,

    /// Anything else: compilation errors, checkpoint I/O, store I/O, tool source errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// The wire-facing error kind tag (`error.kind` in §7 / `ProtocolEvent::OnError.kind`).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "config_invalid",
            Self::AccessDenied(_) => "access_denied",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::TokenLimit(_) => "token_limit",
            Self::ToolBlocked(_) => "tool_blocked",
            Self::BlockedTask(_) => "blocked_task",
            Self::MemoryIngestFailed(_) => "memory_ingest_failed",
            Self::MemoryRetrieveFailed(_) => "memory_retrieve_failed",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<CompilationError> for AgentError {
    fn from(e: CompilationError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CheckpointError> for AgentError {
    fn from(e: CheckpointError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StoreError> for AgentError {
    fn from(e: StoreError) -> Self {
        Self::MemoryRetrieveFailed(e.to_string())
    }
}

impl From<CacheError> for AgentError {
    fn from(e: CacheError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<ToolSourceError> for AgentError {
    fn from(e: ToolSourceError) -> Self {
        Self::ToolBlocked(e.to_string())
    }
}
