//! The six spec nodes of the compiled graph (§4.1-§4.6), plus `StartNode` and the
//! `builder` module that wires them into a `CompiledStateGraph<GraphState>`.

mod builder;
mod end_graph;
mod executor;
mod memory_orchestrator;
mod planner;
mod start;
mod task_updater;
mod verifier;

pub use builder::{build_graph, GraphDeps};
pub use end_graph::EndGraphNode;
pub use executor::AgentExecutorNode;
pub use memory_orchestrator::MemoryOrchestratorNode;
pub use planner::PlanningOrchestratorNode;
pub use start::StartNode;
pub use task_updater::TaskUpdaterNode;
pub use verifier::TaskVerifierNode;
