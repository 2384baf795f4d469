//! AGENT_EXECUTOR: the ReAct step (§4.3).
//!
//! Grounded in the teacher's `agent::react::{think_node, act_node}` split, collapsed into
//! one node because this engine's six-node graph loops the *whole* think+act+observe cycle
//! back through `MEMORY_ORCHESTRATOR` rather than nesting a second inner loop: one
//! invocation is exactly one LLM call, plus (if it asked for tools) one round of tool
//! calls. Looping across rounds is the graph's job, not this node's — it returns to the
//! router every time, same as every other node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::constraints::ExecutionConstraints;
use crate::error::AgentError;
use crate::graph::router::{route, RouteConfig};
use crate::graph::{Next, Node, RunContext};
use crate::llm::{LlmClient, LlmResponse};
use crate::message::{Message, ToolCallRequest};
use crate::state::{GraphState, NodeId, ShortTermMemory, Task, TaskStatus};
use crate::stream::StreamWriter;
use crate::tool_source::{ToolCallContext, ToolSource};

const END_TASK_TOOL: &str = "end_task";
const MAX_LLM_ATTEMPTS: u32 = 3;

pub struct AgentExecutorNode {
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolSource>,
    constraints: ExecutionConstraints,
    route_config: RouteConfig,
}

impl AgentExecutorNode {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolSource>,
        constraints: ExecutionConstraints,
        route_config: RouteConfig,
    ) -> Self {
        Self { llm, tools, constraints, route_config }
    }

    fn build_prompt(task: &Task, rag: &str, stm: &ShortTermMemory, tool_names: &[&str]) -> Vec<Message> {
        let mut system_text = format!("Current task: {}\n", task.text);
        if !task.steps.is_empty() {
            system_text.push_str("\nPlan:\n");
            for step in &task.steps {
                system_text.push_str(&format!("- [{}] {}\n", if step.done { "x" } else { " " }, step.description));
            }
        }
        if !rag.is_empty() {
            system_text.push_str(&format!("\nRelevant context:\n{rag}\n"));
        }
        if !tool_names.is_empty() {
            system_text.push_str(&format!("\nAvailable tools: {}\n", tool_names.join(", ")));
        }

        let mut prompt = vec![Message::system(system_text)];
        prompt.extend(stm.iter().cloned());
        prompt
    }

    /// Exponential backoff on transient timeouts (up to `MAX_LLM_ATTEMPTS`); on a token
    /// limit, trims the oldest STM messages once and retries (§4.3). Streams the call
    /// through `writer` so `on_chat_model_start`/`on_chat_model_stream` are observable, and
    /// surfaces the trimmed token-limit as a non-fatal `on_error` before the retry (§8
    /// scenario 4: one `on_error(token_limit)` followed by a successful `on_chat_model_end`).
    async fn invoke_with_retry(
        &self,
        task: &Task,
        rag: &str,
        stm: &mut ShortTermMemory,
        writer: &StreamWriter<GraphState>,
    ) -> Result<LlmResponse, AgentError> {
        let tool_specs = self.tools.list_tools().await.unwrap_or_default();
        let tool_names: Vec<&str> = tool_specs.iter().map(|t| t.name.as_str()).collect();
        let node_id = NodeId::AgentExecutor.as_str();
        let tools_for_event = if tool_names.is_empty() {
            None
        } else {
            Some(tool_names.iter().map(|n| n.to_string()).collect())
        };

        let mut trimmed_once = false;
        let mut attempt = 0u32;
        loop {
            let prompt = Self::build_prompt(task, rag, stm, &tool_names);
            writer.emit_model_start(tools_for_event.clone(), node_id).await;

            let (chunk_tx, mut chunk_rx) = mpsc::channel(128);
            let forward_writer = writer.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(chunk) = chunk_rx.recv().await {
                    forward_writer.emit_message(chunk.content, node_id).await;
                }
            });
            let result = self.llm.invoke_stream(&prompt, Some(chunk_tx)).await;
            let _ = forwarder.await;

            match result {
                Ok(response) => return Ok(response),
                Err(AgentError::TokenLimit(msg)) if !trimmed_once => {
                    trimmed_once = true;
                    writer.emit_recoverable_error("token_limit", msg, node_id).await;
                    stm.trim_oldest(stm.len() / 2 + 1);
                }
                Err(AgentError::Timeout(_)) if attempt + 1 < MAX_LLM_ATTEMPTS => {
                    attempt += 1;
                    let delay = Duration::from_millis(200 * 2u64.pow(attempt));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_tool(&self, call: &ToolCallRequest, ctx: &ToolCallContext) -> Message {
        match self.tools.call_tool_with_context(&call.name, call.arguments.clone(), Some(ctx)).await {
            Ok(result) => Message::tool(result.text, call.id.clone(), call.name.clone()),
            Err(err) => Message::tool(format!("tool error: {err}"), call.id.clone(), call.name.clone()),
        }
    }
}

impl AgentExecutorNode {
    async fn execute(
        &self,
        mut state: GraphState,
        writer: StreamWriter<GraphState>,
    ) -> Result<(GraphState, Next), AgentError> {
        {
            let rag = state.rag.clone();
            let mut stm = state.memories.stm.clone();
            let task = state
                .current_task_mut()
                .ok_or_else(|| AgentError::Internal("executor ran with no current task".into()))?;
            if task.status == TaskStatus::Pending {
                task.status = TaskStatus::InProgress;
            }
            task.constraints.step_in_progress = true;

            let response = self.invoke_with_retry(task, &rag, &mut stm, &writer).await?;
            state.memories.stm = stm;

            if response.tool_calls.is_empty() {
                let content = if response.content.trim().is_empty() {
                    "No further action; awaiting verification.".to_string()
                } else {
                    response.content
                };
                let ai_message = Message::ai(content).with_additional("from", NodeId::AgentExecutor.as_str());
                state.memories.stm.push(ai_message.clone());
                state.messages.push(ai_message);

                let task = state.current_task_mut().expect("checked above");
                task.status = TaskStatus::WaitingValidation;
                task.constraints.step_in_progress = false;
            } else {
                let ai_message = Message::ai_with_tool_calls(response.content, response.tool_calls.clone())
                    .with_additional("from", NodeId::AgentExecutor.as_str());
                state.memories.stm.push(ai_message.clone());
                state.messages.push(ai_message);

                let tool_ctx = ToolCallContext::new(state.messages.clone());
                let mut reached_end_task = false;

                for call in &response.tool_calls {
                    let task = state.current_task_mut().expect("checked above");
                    let verdict = task.constraints.check(&self.constraints, &call.name);
                    let tool_message = match verdict {
                        Ok(()) => {
                            let message = self.call_tool(call, &tool_ctx).await;
                            let task = state.current_task_mut().expect("checked above");
                            task.constraints.record(&self.constraints, &call.name);
                            if call.name == END_TASK_TOOL {
                                reached_end_task = true;
                            }
                            message
                        }
                        Err(violation) => {
                            Message::tool(format!("blocked: {violation}"), call.id.clone(), call.name.clone())
                        }
                    };
                    state.memories.stm.push(tool_message.clone());
                    state.messages.push(tool_message);
                }

                let task = state.current_task_mut().expect("checked above");
                if reached_end_task {
                    task.status = TaskStatus::WaitingValidation;
                    task.constraints.step_in_progress = false;
                }
            }
        }

        state.last_node = Some(NodeId::AgentExecutor);
        state.current_graph_step += 1;
        let target = route(&mut state, &self.route_config);
        Ok((state, Next::Node(target.as_str().to_string())))
    }
}

#[async_trait]
impl Node<GraphState> for AgentExecutorNode {
    fn id(&self) -> &str {
        NodeId::AgentExecutor.as_str()
    }

    async fn run(&self, state: GraphState) -> Result<(GraphState, Next), AgentError> {
        self.execute(state, StreamWriter::noop()).await
    }

    async fn run_with_context(
        &self,
        state: GraphState,
        ctx: &RunContext<GraphState>,
    ) -> Result<(GraphState, Next), AgentError> {
        self.execute(state, ctx.stream_writer()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentMode, ExecutionMode};
    use crate::tool_source::{ToolCallContent, ToolSourceError, ToolSpec};
    use serde_json::{json, Value};

    struct ScriptedLlm {
        responses: std::sync::Mutex<Vec<LlmResponse>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self { responses: std::sync::Mutex::new(responses) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, AgentError> {
            let mut guard = self.responses.lock().unwrap();
            if guard.is_empty() {
                return Ok(LlmResponse { content: "done".into(), tool_calls: vec![], usage: None });
            }
            Ok(guard.remove(0))
        }
    }

    struct EchoTools;

    #[async_trait]
    impl ToolSource for EchoTools {
        async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
            Ok(vec![ToolSpec { name: "calculator".into(), description: None, input_schema: json!({}) }])
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallContent, ToolSourceError> {
            self.call_tool_with_context(name, arguments, None).await
        }

        async fn call_tool_with_context(
            &self,
            name: &str,
            _arguments: Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            if name == END_TASK_TOOL {
                Ok(ToolCallContent { text: "ended".into() })
            } else {
                Ok(ToolCallContent { text: "4".into() })
            }
        }
    }

    fn route_config() -> RouteConfig {
        RouteConfig { max_graph_steps: 500, mode: AgentMode::Autonomous, execution_mode: ExecutionMode::Planned }
    }

    fn state_with_task() -> GraphState {
        let mut state = GraphState::default();
        state.tasks.push(Task::new("t1", "do a thing"));
        state
    }

    #[tokio::test]
    async fn plain_content_response_moves_task_to_waiting_validation() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmResponse {
            content: "here is the answer".into(),
            tool_calls: vec![],
            usage: None,
        }]));
        let node = AgentExecutorNode::new(llm, Arc::new(EchoTools), ExecutionConstraints::default(), route_config());
        let (state, _) = node.run(state_with_task()).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::WaitingValidation);
        assert_eq!(state.messages.last().unwrap().content, "here is the answer");
    }

    #[tokio::test]
    async fn tool_call_appends_result_and_stays_in_progress() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCallRequest { id: "c1".into(), name: "calculator".into(), arguments: json!({}) }],
            usage: None,
        }]));
        let node = AgentExecutorNode::new(llm, Arc::new(EchoTools), ExecutionConstraints::default(), route_config());
        let (state, _) = node.run(state_with_task()).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(state.messages.last().unwrap().content, "4");
    }

    #[tokio::test]
    async fn end_task_tool_moves_to_waiting_validation() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCallRequest { id: "c1".into(), name: END_TASK_TOOL.into(), arguments: json!({"summary": "x"}) }],
            usage: None,
        }]));
        let node = AgentExecutorNode::new(llm, Arc::new(EchoTools), ExecutionConstraints::default(), route_config());
        let (state, _) = node.run(state_with_task()).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::WaitingValidation);
        assert_eq!(state.tasks[0].constraints.completion_attempts, 1);
    }

    #[tokio::test]
    async fn blocked_tool_call_does_not_invoke_tool() {
        let mut state = state_with_task();
        state.tasks[0].constraints.record(&ExecutionConstraints::default(), END_TASK_TOOL);
        let llm = Arc::new(ScriptedLlm::new(vec![LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCallRequest { id: "c1".into(), name: END_TASK_TOOL.into(), arguments: json!({}) }],
            usage: None,
        }]));
        let node = AgentExecutorNode::new(llm, Arc::new(EchoTools), ExecutionConstraints::default(), route_config());
        let (state, _) = node.run(state).await.unwrap();
        assert!(state.messages.last().unwrap().content.starts_with("blocked:"));
        assert_ne!(state.tasks[0].status, TaskStatus::WaitingValidation);
    }
}
