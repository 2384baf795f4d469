//! Terminal node: stamps `last_node` and stops the graph.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::state::{GraphState, NodeId};

pub struct EndGraphNode;

impl EndGraphNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EndGraphNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node<GraphState> for EndGraphNode {
    fn id(&self) -> &str {
        NodeId::EndGraph.as_str()
    }

    async fn run(&self, mut state: GraphState) -> Result<(GraphState, Next), AgentError> {
        state.last_node = Some(NodeId::EndGraph);
        Ok((state, Next::End))
    }
}
