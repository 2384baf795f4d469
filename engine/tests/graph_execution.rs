//! End-to-end run of the compiled six-node graph, through `build_graph`, with a scripted
//! LLM and the in-memory store/checkpointer.


use std::sync::Arc;

use engine::config::{
    AgentConfig, AgentMode, ExecutionMode, GraphConfig, MemoryConfig, RagConfig, RetryConfig,
};
use engine::constraints::ExecutionConstraints;
use engine::llm::MockLlm;
use engine::memory::{InMemoryStore, MemorySaver, RunnableConfig};
use engine::message::{Message, ToolCallRequest};
use engine::nodes::{build_graph, GraphDeps};
use engine::state::{ErrorKind, GraphState, TaskStatus};
use engine::tools::{CalculatorTool, EndTaskTool, StaticToolSource};

fn config(mode: AgentMode, max_graph_steps: u32) -> AgentConfig {
    AgentConfig {
        id: "agent-1".into(),
        user_id: "user-1".into(),
        profile: "default".into(),
        mode,
        graph: GraphConfig {
            max_graph_steps,
            model_refs: vec!["mock-1".into()],
            execution_mode: ExecutionMode::Planned,
        },
        memory: MemoryConfig::default(),
        rag: RagConfig::default(),
        retries: RetryConfig::default(),
        tools: vec!["calculator".into(), "end_task".into()],
        prompts: Default::default(),
        cfg_version: 1,
    }
}

fn tools() -> Arc<StaticToolSource> {
    Arc::new(StaticToolSource::new(vec![
        Arc::new(CalculatorTool::new()),
        Arc::new(EndTaskTool::new()),
    ]))
}

/// An autonomous run that calls `end_task` on its first executor turn should reach
/// `Completed` and checkpoint the final state under the run's thread id.
#[tokio::test]
async fn autonomous_run_completes_task_via_end_task_and_checkpoints() {
    let llm = Arc::new(MockLlm::with_tool_call(
        ToolCallRequest {
            id: "call-1".into(),
            name: "end_task".into(),
            arguments: serde_json::json!({"summary": "done"}),
        },
        "no further action",
    ));
    let checkpointer = Arc::new(MemorySaver::<GraphState>::new());
    let deps = GraphDeps {
        llm,
        tools: tools(),
        store: Arc::new(InMemoryStore::new()),
        checkpointer: checkpointer.clone(),
        constraints: ExecutionConstraints::default(),
    };

    let compiled = build_graph(&config(AgentMode::Autonomous, 20), deps).expect("graph compiles");

    let mut state = GraphState::default();
    state.messages.push(Message::human("write a haiku"));
    let run_config = RunnableConfig { thread_id: Some("thread-1".into()), ..Default::default() };

    let final_state = compiled
        .invoke(state, Some(run_config))
        .await
        .expect("run completes within the step budget");

    assert!(!final_state.tasks.is_empty());
    assert_eq!(final_state.tasks[0].status, TaskStatus::Completed);
    assert_eq!(final_state.tasks[0].constraints.completion_attempts, 1);

    let (checkpoint, _metadata) = checkpointer
        .get_tuple(&RunnableConfig { thread_id: Some("thread-1".into()), ..Default::default() })
        .await
        .expect("checkpoint lookup succeeds")
        .expect("a checkpoint was written for this thread");
    assert!(!checkpoint.state.tasks.is_empty());
}

/// In Autonomous mode, a verdict that never produces `Completed`/`Failed` (the LLM keeps
/// replying without calling `end_task`) sends the task to `NeedsRetry` and then `Failed`;
/// because `memory_family` always routes a terminal task back to the Planner, and the
/// Planner starts a fresh task for an unchanged goal, the run never reaches `END_GRAPH` on
/// its own — it only terminates via the router's step-limit rule. A small budget keeps this
/// test fast and deterministic.
#[tokio::test]
async fn autonomous_run_without_end_task_terminates_via_step_limit() {
    let llm = Arc::new(MockLlm::fixed("thinking out loud"));
    let deps = GraphDeps {
        llm,
        tools: tools(),
        store: Arc::new(InMemoryStore::new()),
        checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
        constraints: ExecutionConstraints::default(),
    };

    let compiled = build_graph(&config(AgentMode::Autonomous, 9), deps).expect("graph compiles");

    let mut state = GraphState::default();
    state.messages.push(Message::human("keep going forever"));

    let final_state = compiled
        .invoke(state, None)
        .await
        .expect("run terminates at the step limit rather than looping forever");

    assert!(final_state.current_graph_step >= 9);
    assert!(!final_state.tasks.is_empty());

    let error = final_state.error.expect("router rule 2 records step_limit_exceeded");
    assert_eq!(error.kind, ErrorKind::StepLimitExceeded);
}

/// `(Interactive, Reactive)` dispatches straight to `AGENT_EXECUTOR`, skipping the planner
/// entirely (§4.1 rule 5) — so a single reply with no tool calls moves the task straight to
/// `WaitingValidation` without ever creating plan steps.
#[tokio::test]
async fn interactive_reactive_skips_planner() {
    let mut cfg = config(AgentMode::Interactive, 20);
    cfg.graph.execution_mode = ExecutionMode::Reactive;

    let llm = Arc::new(MockLlm::fixed("here is my answer"));
    let deps = GraphDeps {
        llm,
        tools: tools(),
        store: Arc::new(InMemoryStore::new()),
        checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
        constraints: ExecutionConstraints::default(),
    };

    let compiled = build_graph(&cfg, deps).expect("graph compiles");

    let mut state = GraphState::default();
    state.messages.push(Message::human("quick question"));
    // Reactive mode never goes through the planner, so there is no pre-existing task;
    // the executor requires one, so seed it directly as a Reactive caller would.
    state.tasks.push(engine::state::Task::new("t1", "quick question"));

    let final_state = compiled.invoke(state, None).await.expect("run completes");
    assert_eq!(final_state.tasks[0].steps.len(), 0);
}
