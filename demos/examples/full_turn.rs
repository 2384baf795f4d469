//! Runs one full turn of the compiled agent graph: a human message goes in, the executor
//! calls `end_task`, the verifier marks the task complete.
//!
//! Run: `cargo run -p demos --example full_turn`

use std::sync::Arc;

use engine::config::{AgentConfig, AgentMode, ExecutionMode, GraphConfig, MemoryConfig, RagConfig, RetryConfig};
use engine::constraints::ExecutionConstraints;
use engine::llm::MockLlm;
use engine::memory::{InMemoryStore, MemorySaver};
use engine::message::{Message, ToolCallRequest};
use engine::nodes::{build_graph, GraphDeps};
use engine::state::GraphState;
use engine::tools::{CalculatorTool, EndTaskTool, StaticToolSource};

#[tokio::main]
async fn main() {
    let config = AgentConfig {
        id: "demo-agent".into(),
        user_id: "demo-user".into(),
        profile: "default".into(),
        mode: AgentMode::Autonomous,
        graph: GraphConfig {
            max_graph_steps: 12,
            model_refs: vec!["mock-1".into()],
            execution_mode: ExecutionMode::Planned,
        },
        memory: MemoryConfig::default(),
        rag: RagConfig::default(),
        retries: RetryConfig::default(),
        tools: vec!["calculator".into(), "end_task".into()],
        prompts: Default::default(),
        cfg_version: 1,
    };

    let deps = GraphDeps {
        llm: Arc::new(MockLlm::with_tool_call(
            ToolCallRequest {
                id: "call-1".into(),
                name: "end_task".into(),
                arguments: serde_json::json!({"summary": "computed the answer"}),
            },
            "no further action",
        )),
        tools: Arc::new(StaticToolSource::new(vec![
            Arc::new(CalculatorTool::new()),
            Arc::new(EndTaskTool::new()),
        ])),
        store: Arc::new(InMemoryStore::new()),
        checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
        constraints: ExecutionConstraints::default(),
    };

    let compiled = build_graph(&config, deps).expect("graph compiles");

    let mut state = GraphState::default();
    state.messages.push(Message::human("what's 2 + 2?"));

    let final_state = compiled.invoke(state, None).await.expect("run completes");

    let task = &final_state.tasks[0];
    println!("task status: {:?}", task.status);
    println!("last message: {}", final_state.messages.last().unwrap().content);
}
