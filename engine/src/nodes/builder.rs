//! Wires the six spec nodes (plus `StartNode`) into a compiled graph (§4.1 "Compiled graph
//! shape (fixed at build time)").
//!
//! Every node computes its own `Next` by calling `graph::router::route` (or, for
//! `TaskVerifierNode`, via a single fixed edge) and returns `Next::Node(id)` directly, so
//! the `StateGraph` only needs two structural edges — `START -> "START"` and
//! `"END_GRAPH" -> END` — to satisfy `compile()`'s validation. The six real nodes never
//! appear in `StateGraph`'s edge list, which is also why `compile()`'s linear-chain cycle
//! detector never has to reason about a graph that actually cycles.

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::constraints::ExecutionConstraints;
use crate::graph::router::RouteConfig;
use crate::graph::{CompilationError, CompiledStateGraph, StateGraph, END, START};
use crate::llm::LlmClient;
use crate::memory::{Checkpointer, Store};
use crate::nodes::{
    AgentExecutorNode, EndGraphNode, MemoryOrchestratorNode, PlanningOrchestratorNode,
    StartNode, TaskUpdaterNode, TaskVerifierNode,
};
use crate::state::{GraphState, NodeId};
use crate::tool_source::ToolSource;

/// External collaborators a compiled graph closes over. Bundled into one value so
/// `RuntimeCache`'s `rebuild_fn` (§4.7) can carry exactly one closure per agent.
#[derive(Clone)]
pub struct GraphDeps {
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<dyn ToolSource>,
    pub store: Arc<dyn Store>,
    pub checkpointer: Arc<dyn Checkpointer<GraphState>>,
    pub constraints: ExecutionConstraints,
}

fn route_config(config: &AgentConfig) -> RouteConfig {
    RouteConfig {
        max_graph_steps: config.graph.max_graph_steps,
        mode: config.mode,
        execution_mode: config.graph.execution_mode,
    }
}

/// Builds the fixed graph topology in §4.1 from an `AgentConfig` and its dependencies.
pub fn build_graph(
    config: &AgentConfig,
    deps: GraphDeps,
) -> Result<CompiledStateGraph<GraphState>, CompilationError> {
    let rc = route_config(config);

    let mut graph = StateGraph::<GraphState>::new();
    graph
        .add_node(NodeId::Start.as_str(), Arc::new(StartNode::new(rc.clone())))
        .add_node(
            NodeId::PlanningOrchestrator.as_str(),
            Arc::new(PlanningOrchestratorNode::new(deps.llm.clone(), deps.tools.clone(), rc.clone())),
        )
        .add_node(
            NodeId::AgentExecutor.as_str(),
            Arc::new(AgentExecutorNode::new(
                deps.llm.clone(),
                deps.tools.clone(),
                deps.constraints.clone(),
                rc.clone(),
            )),
        )
        .add_node(NodeId::TaskVerifier.as_str(), Arc::new(TaskVerifierNode::new()))
        .add_node(NodeId::TaskUpdater.as_str(), Arc::new(TaskUpdaterNode::new(rc.clone())))
        .add_node(
            NodeId::MemoryOrchestrator.as_str(),
            Arc::new(MemoryOrchestratorNode::new(
                deps.store.clone(),
                config.user_id.clone(),
                config.memory.clone(),
                config.rag.clone(),
                rc.clone(),
            )),
        )
        .add_node(NodeId::EndGraph.as_str(), Arc::new(EndGraphNode::new()))
        .add_edge(START, NodeId::Start.as_str())
        .add_edge(NodeId::EndGraph.as_str(), END);

    graph.compile_with_checkpointer(deps.checkpointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, ExecutionMode, GraphConfig, MemoryConfig, RagConfig, RetryConfig};
    use crate::llm::MockLlm;
    use crate::memory::{InMemoryStore, MemorySaver, RunnableConfig};
    use crate::message::Message;
    use crate::tools::{CalculatorTool, EndTaskTool, StaticToolSource};
    use std::sync::Arc as StdArc;

    fn sample_config() -> AgentConfig {
        AgentConfig {
            id: "agent-1".into(),
            user_id: "user-1".into(),
            profile: "default".into(),
            mode: crate::config::AgentMode::Autonomous,
            graph: GraphConfig { model_refs: vec!["mock-1".into()], execution_mode: ExecutionMode::Planned, ..GraphConfig::default() },
            memory: MemoryConfig::default(),
            rag: RagConfig::default(),
            retries: RetryConfig::default(),
            tools: vec!["calculator".into(), "end_task".into()],
            prompts: Default::default(),
            cfg_version: 1,
        }
    }

    fn deps() -> GraphDeps {
        GraphDeps {
            llm: Arc::new(MockLlm::fixed("no further action")),
            tools: Arc::new(StaticToolSource::new(vec![
                StdArc::new(CalculatorTool::new()),
                StdArc::new(EndTaskTool::new()),
            ])),
            store: Arc::new(InMemoryStore::new()),
            checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
            constraints: ExecutionConstraints::default(),
        }
    }

    #[test]
    fn builds_without_compile_error() {
        let config = sample_config();
        let compiled = build_graph(&config, deps()).expect("graph compiles");
        assert_eq!(compiled.edge_order().first().map(String::as_str), Some(NodeId::Start.as_str()));
    }

    #[tokio::test]
    async fn runs_a_full_turn_end_to_end() {
        let config = sample_config();
        let compiled = build_graph(&config, deps()).expect("graph compiles");
        let mut state = GraphState::default();
        state.messages.push(Message::human("hello"));
        let run_config = RunnableConfig { thread_id: Some("t1".into()), ..Default::default() };
        let final_state = compiled.invoke(state, Some(run_config)).await.expect("run completes");
        assert!(!final_state.tasks.is_empty());
    }
}
