//! Tool source abstraction: list tools and call a tool.
//!
//! The executor depends on `ToolSource` instead of a concrete tool registry. Built-in tools
//! (`engine::tools`) are the demonstrative implementations; a deployment can supply its own
//! `ToolSource` (e.g. backed by MCP) without touching the graph.

mod context;

pub use context::ToolCallContext;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Tool specification, aligned with the MCP `tools/list` result shape.
///
/// Used by the executor to build tool descriptions for the LLM call (§4.3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    /// Tool name, as referenced in a tool call request.
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: Option<String>,
    /// JSON Schema for arguments.
    pub input_schema: Value,
}

/// Result of a single tool call; aligns with MCP `tools/call` content.
#[derive(Debug, Clone)]
pub struct ToolCallContent {
    pub text: String,
}

/// Errors from listing or calling tools.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidInput(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("execution error: {0}")]
    Execution(String),
}

/// Tool source: list tools and call a tool.
///
/// The executor depends on this instead of a concrete registry: it calls `list_tools()` to
/// build the LLM prompt's tool list, and `call_tool_with_context()` to execute a tool call
/// chosen by the LLM.
///
/// **Call context**: tools that need current-step state (e.g. recent messages) receive it via
/// `call_tool_with_context`; the default ignores `ctx` and delegates to `call_tool`.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Lists available tools.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    /// Calls a tool by name with JSON arguments.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallContent, ToolSourceError>;

    /// Calls a tool with optional per-step context (e.g. current messages).
    ///
    /// Default ignores `ctx` and calls [`call_tool`](ToolSource::call_tool). Implementations
    /// that need context override this.
    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let _ = ctx;
        self.call_tool(name, arguments).await
    }
}
