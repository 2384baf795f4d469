//! Routing function: `(GraphState, RouteConfig) -> NodeId` (§4.1).
//!
//! The compiled graph's conditional edges all resolve through [`route`]; callers are
//! responsible for clearing `skip_validation` once consumed, and for incrementing
//! `current_graph_step` before routing runs. `route` takes `state` by `&mut` only to
//! populate `GraphState.error` when rule 2 (step limit) fires — every other rule is a
//! pure read.
//!
//! `TASK_VERIFIER` always advances to `TASK_UPDATER` via a fixed (unconditional) edge, so by
//! the time the router sees `last_node`, the Verifier/Updater family is always tagged
//! `TaskUpdater`: `route` never receives `last_node == Some(TaskVerifier)`.

use crate::config::{AgentMode, ExecutionMode};
use crate::state::{ErrorKind, GraphState, NodeId, StateError, TaskStatus};

/// The subset of `AgentConfig` the router needs to make a decision, pulled out of the
/// larger config so `route` stays a narrow pure function.
#[derive(Clone, Copy, Debug)]
pub struct RouteConfig {
    pub max_graph_steps: u32,
    pub mode: AgentMode,
    pub execution_mode: ExecutionMode,
}

/// Decides the next node for one router invocation. See module docs for precedence.
///
/// Rule 2 (step limit) stamps `state.error = StepLimitExceeded` before returning
/// `EndGraph`, so the terminal checkpoint and the dispatcher's final `on_chain_end` both
/// carry `kind=step_limit_exceeded` (§7, §8 scenario 6) rather than silently stopping.
pub fn route(state: &mut GraphState, config: &RouteConfig) -> NodeId {
    if let Some(err) = &state.error {
        if err.kind != ErrorKind::BlockedTask {
            return NodeId::EndGraph;
        }
    }

    if state.current_graph_step >= config.max_graph_steps {
        state.error = Some(StateError {
            kind: ErrorKind::StepLimitExceeded,
            source: "router".to_string(),
            message: format!(
                "graph step {} reached max_graph_steps {}",
                state.current_graph_step, config.max_graph_steps
            ),
            ts: chrono::Utc::now().to_rfc3339(),
        });
        return NodeId::EndGraph;
    }

    if state.skip_validation.skip {
        return state.skip_validation.goto.unwrap_or(NodeId::EndGraph);
    }

    match state.last_node {
        None | Some(NodeId::Start) => entry_dispatch(config),
        Some(NodeId::TaskUpdater) | Some(NodeId::TaskVerifier) => verifier_family(state),
        Some(NodeId::MemoryOrchestrator) => memory_family(state),
        Some(NodeId::AgentExecutor) => executor_family(state),
        Some(NodeId::PlanningOrchestrator) => NodeId::MemoryOrchestrator,
        Some(NodeId::EndGraph) => NodeId::EndGraph,
    }
}

fn verifier_family(state: &GraphState) -> NodeId {
    match state.current_task().map(|t| t.status) {
        Some(TaskStatus::Completed) | Some(TaskStatus::Failed) => NodeId::MemoryOrchestrator,
        _ => NodeId::AgentExecutor,
    }
}

fn memory_family(state: &GraphState) -> NodeId {
    match state.current_task() {
        Some(task) if task.status.is_terminal() => NodeId::PlanningOrchestrator,
        _ => NodeId::AgentExecutor,
    }
}

fn executor_family(state: &GraphState) -> NodeId {
    if let Some(task) = state.current_task() {
        if task.status == TaskStatus::WaitingValidation {
            return NodeId::TaskVerifier;
        }
    }
    if let Some(err) = &state.error {
        if err.kind == ErrorKind::BlockedTask {
            return NodeId::PlanningOrchestrator;
        }
    }
    NodeId::MemoryOrchestrator
}

fn entry_dispatch(config: &RouteConfig) -> NodeId {
    match (config.mode, config.execution_mode) {
        (AgentMode::Interactive, ExecutionMode::Reactive) => NodeId::AgentExecutor,
        (AgentMode::Interactive, _) => NodeId::PlanningOrchestrator,
        (AgentMode::Autonomous, _) => NodeId::PlanningOrchestrator,
        (AgentMode::Hybrid, _) => NodeId::EndGraph,
    }
}
