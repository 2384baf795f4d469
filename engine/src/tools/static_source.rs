//! Adapts a fixed set of `Tool` trait objects into a `ToolSource`.
//!
//! Bridges the built-in demonstrative tools (`calculator`, `end_task`) into the interface the
//! executor node actually depends on; a deployment swaps this for an MCP-backed `ToolSource`
//! without the executor noticing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};
use crate::tools::Tool;

/// `ToolSource` over a fixed `Vec<Arc<dyn Tool>>`, indexed by name at construction.
pub struct StaticToolSource {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl StaticToolSource {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let tools = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        Self { tools }
    }
}

#[async_trait]
impl ToolSource for StaticToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self
            .tools
            .values()
            .map(|t| {
                let spec = t.spec();
                ToolSpec {
                    name: spec.name,
                    description: spec.description,
                    input_schema: spec.input_schema,
                }
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallContent, ToolSourceError> {
        self.call_tool_with_context(name, arguments, None).await
    }

    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))?;
        tool.call(arguments, ctx).await
    }
}
