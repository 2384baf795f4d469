//! Structured logging for graph execution: node start/complete, state updates,
//! and graph-level start/complete/error events.

use std::fmt::Debug;

/// Log node execution start.
pub fn log_node_start(node_id: &str) {
    tracing::debug!(node_id = node_id, "starting node execution");
}

/// Log the state at the start of node execution (input state for that node).
pub fn log_node_state<S: Debug>(node_id: &str, state: &S) {
    tracing::debug!(node_id = node_id, state = ?state, "node execution: state");
}

/// Log node execution completion, including the routing decision.
pub fn log_node_complete(node_id: &str, next: &crate::graph::Next) {
    tracing::debug!(node_id = node_id, ?next, "node execution complete");
}

/// Log that state was merged after a node's output.
pub fn log_state_update(node_id: &str) {
    tracing::debug!(node_id = node_id, "state updated");
}

/// Log graph execution start.
pub fn log_graph_start() {
    tracing::info!("starting graph execution");
}

/// Log graph execution completion.
pub fn log_graph_complete() {
    tracing::info!("graph execution complete");
}

/// Log graph execution error.
pub fn log_graph_error(error: &crate::error::AgentError) {
    tracing::error!(?error, "graph execution error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_functions_do_not_panic() {
        log_node_start("test_node");
        log_node_state("test_node", &());
        log_node_complete("test_node", &crate::graph::Next::End);
        log_state_update("test_node");
        log_graph_start();
        log_graph_complete();
        log_graph_error(&crate::error::AgentError::Internal("test".to_string()));
    }
}
