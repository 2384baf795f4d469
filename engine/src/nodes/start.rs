//! Entry dispatch node.
//!
//! Registered as a distinct node id (`"START"`) from the builder's `StateGraph::START`
//! sentinel so the graph's two real edges (`START sentinel -> "START"`, `"END_GRAPH" ->
//! END sentinel`) stay trivial and cycle detection never has to reason about the six real
//! spec nodes (see `nodes::builder`). Does no work beyond routing: on first entry
//! `state.last_node` is `None`, so `route` resolves via `entry_dispatch` (§4.1 rule 5).

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::router::{route, RouteConfig};
use crate::graph::{Next, Node};
use crate::state::{GraphState, NodeId};

pub struct StartNode {
    route_config: RouteConfig,
}

impl StartNode {
    pub fn new(route_config: RouteConfig) -> Self {
        Self { route_config }
    }
}

#[async_trait]
impl Node<GraphState> for StartNode {
    fn id(&self) -> &str {
        NodeId::Start.as_str()
    }

    async fn run(&self, mut state: GraphState) -> Result<(GraphState, Next), AgentError> {
        let target = route(&mut state, &self.route_config);
        Ok((state, Next::Node(target.as_str().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentMode, ExecutionMode};

    fn config(mode: AgentMode, execution_mode: ExecutionMode) -> RouteConfig {
        RouteConfig {
            max_graph_steps: 500,
            mode,
            execution_mode,
        }
    }

    #[tokio::test]
    async fn fresh_state_dispatches_via_entry_rule() {
        let node = StartNode::new(config(AgentMode::Autonomous, ExecutionMode::Planned));
        let (_, next) = node.run(GraphState::default()).await.unwrap();
        assert_eq!(next, Next::Node(NodeId::PlanningOrchestrator.as_str().to_string()));
    }

    #[tokio::test]
    async fn reactive_interactive_dispatches_to_executor() {
        let node = StartNode::new(config(AgentMode::Interactive, ExecutionMode::Reactive));
        let (_, next) = node.run(GraphState::default()).await.unwrap();
        assert_eq!(next, Next::Node(NodeId::AgentExecutor.as_str().to_string()));
    }
}
