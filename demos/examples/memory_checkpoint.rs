//! Builds the compiled graph with a `MemorySaver` checkpointer, invokes it with a thread id,
//! then reloads the saved checkpoint.
//!
//! Run: `cargo run -p demos --example memory_checkpoint`

use std::sync::Arc;

use engine::config::{AgentConfig, AgentMode, ExecutionMode, GraphConfig, MemoryConfig, RagConfig, RetryConfig};
use engine::constraints::ExecutionConstraints;
use engine::llm::MockLlm;
use engine::memory::{Checkpointer, InMemoryStore, MemorySaver, RunnableConfig};
use engine::message::Message;
use engine::nodes::{build_graph, GraphDeps};
use engine::state::GraphState;
use engine::tools::StaticToolSource;

#[tokio::main]
async fn main() {
    let config = AgentConfig {
        id: "demo-agent".into(),
        user_id: "demo-user".into(),
        profile: "default".into(),
        mode: AgentMode::Interactive,
        graph: GraphConfig {
            max_graph_steps: 6,
            model_refs: vec!["mock-1".into()],
            execution_mode: ExecutionMode::Reactive,
        },
        memory: MemoryConfig::default(),
        rag: RagConfig::default(),
        retries: RetryConfig::default(),
        tools: vec![],
        prompts: Default::default(),
        cfg_version: 1,
    };

    let checkpointer = Arc::new(MemorySaver::<GraphState>::new());
    let deps = GraphDeps {
        llm: Arc::new(MockLlm::fixed("hello back")),
        tools: Arc::new(StaticToolSource::new(vec![])),
        store: Arc::new(InMemoryStore::new()),
        checkpointer: checkpointer.clone(),
        constraints: ExecutionConstraints::default(),
    };

    let compiled = build_graph(&config, deps).expect("graph compiles");

    let run_config = RunnableConfig { thread_id: Some("session-1".into()), ..Default::default() };

    let mut state = GraphState::default();
    state.messages.push(Message::human("hello"));
    state.tasks.push(engine::state::Task::new("t1", "hello"));

    compiled
        .invoke(state, Some(run_config.clone()))
        .await
        .expect("run completes");

    let (checkpoint, _metadata) = checkpointer
        .get_tuple(&run_config)
        .await
        .expect("checkpointer reachable")
        .expect("a checkpoint was written for this thread");

    println!("checkpoint id: {}", checkpoint.id);
    println!("messages at checkpoint: {}", checkpoint.state.messages.len());
}
