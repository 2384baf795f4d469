//! TASK_UPDATER: applies the verifier's verdict to the message trail and hands control
//! back to the router (§4.4).
//!
//! Split from the verifier so "decide" and "apply" are distinct steps: the verifier owns
//! the task-status transition, this node owns stamping the wire-facing `taskCompleted` /
//! `taskSuccess` fields onto the reply that triggered verification (`message::Message`'s
//! doc comment names these as "Verifier's per-task verdict", carried by whichever node
//! the router places them on). `route` dispatches `last_node == TaskUpdater` through the
//! same `verifier_family` rule as `TaskVerifier` itself.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::router::{route, RouteConfig};
use crate::graph::{Next, Node};
use crate::state::{GraphState, NodeId, TaskStatus};

pub struct TaskUpdaterNode {
    route_config: RouteConfig,
}

impl TaskUpdaterNode {
    pub fn new(route_config: RouteConfig) -> Self {
        Self { route_config }
    }
}

#[async_trait]
impl Node<GraphState> for TaskUpdaterNode {
    fn id(&self) -> &str {
        NodeId::TaskUpdater.as_str()
    }

    async fn run(&self, mut state: GraphState) -> Result<(GraphState, Next), AgentError> {
        let status = state.current_task().map(|t| t.status);

        if let (Some(status), Some(last)) = (status, state.messages.last_mut()) {
            last.additional.insert("taskCompleted".into(), status.is_terminal().into());
            last.additional.insert("taskSuccess".into(), (status == TaskStatus::Completed).into());
        }

        state.last_node = Some(NodeId::TaskUpdater);
        let target = route(&mut state, &self.route_config);
        Ok((state, Next::Node(target.as_str().to_string())))
    }
}
