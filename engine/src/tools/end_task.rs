//! `end_task`: the tool an agent calls to signal that the current task is complete.
//!
//! Constrained by the execution constraints subsystem (§4.6): limited to a single retry
//! and listed in `blockedAfter` for most other tools, so once the agent ends the task no
//! further tool calls are accepted for that step.

use async_trait::async_trait;
use serde_json::Value;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use crate::tools::Tool;

pub struct EndTaskTool;

impl EndTaskTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EndTaskTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EndTaskTool {
    fn name(&self) -> &str {
        "end_task"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "end_task".to_string(),
            description: Some(
                "Signals that the current task is complete. Call this once you have a final \
                 answer or have finished the requested work; no further tool calls are accepted \
                 afterward."
                    .to_string(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "A short summary of the completed task's outcome"
                    }
                },
                "required": ["summary"]
            }),
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let summary = args
            .get("summary")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing \"summary\" string".to_string()))?;

        Ok(ToolCallContent {
            text: summary.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn call_returns_summary_text() {
        let tool = EndTaskTool::new();
        let result = tool
            .call(json!({"summary": "Computed the result and reported it."}), None)
            .await
            .unwrap();
        assert_eq!(result.text, "Computed the result and reported it.");
    }

    #[tokio::test]
    async fn rejects_missing_summary() {
        let tool = EndTaskTool::new();
        let result = tool.call(json!({}), None).await;
        assert!(matches!(result, Err(ToolSourceError::InvalidInput(_))));
    }

    #[test]
    fn name_is_end_task() {
        assert_eq!(EndTaskTool::new().name(), "end_task");
    }
}
