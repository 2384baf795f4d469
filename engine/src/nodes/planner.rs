//! PLANNING_ORCHESTRATOR: creates or refines the current task (§4.2).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::router::{route, RouteConfig};
use crate::graph::{Next, Node};
use crate::llm::LlmClient;
use crate::message::{Message, Role};
use crate::state::{GraphState, NodeId, Step, Task, TaskStatus, ToolSpec};
use crate::tool_source::ToolSource;

/// Planner prompts ask for at most this many steps; response lines past the limit are
/// dropped rather than rejected outright.
const MAX_PLAN_STEPS: usize = 7;

pub struct PlanningOrchestratorNode {
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolSource>,
    route_config: RouteConfig,
}

impl PlanningOrchestratorNode {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<dyn ToolSource>, route_config: RouteConfig) -> Self {
        Self { llm, tools, route_config }
    }
}

/// Collapses runs of whitespace so two goals that differ only in spacing compare equal
/// (§4.2's "exact-string match; normalized whitespace").
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn latest_goal(state: &GraphState) -> String {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Human)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[async_trait]
impl Node<GraphState> for PlanningOrchestratorNode {
    fn id(&self) -> &str {
        NodeId::PlanningOrchestrator.as_str()
    }

    async fn run(&self, mut state: GraphState) -> Result<(GraphState, Next), AgentError> {
        let goal = latest_goal(&state);
        let normalized_goal = normalize(&goal);

        let reuse_existing = state.tasks.last().is_some_and(|task| {
            normalize(&task.text) == normalized_goal
                && matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
        });

        if !reuse_existing {
            let tool_specs = self.tools.list_tools().await.unwrap_or_default();
            let tool_names: Vec<&str> = tool_specs.iter().map(|t| t.name.as_str()).collect();

            let prompt = vec![
                Message::system(format!(
                    "You are a planning assistant. Break the user's request into at most {MAX_PLAN_STEPS} \
                     concrete steps, one per line. Available tools: {}.",
                    if tool_names.is_empty() { "none".to_string() } else { tool_names.join(", ") }
                )),
                Message::human(goal.clone()),
            ];
            let response = self.llm.invoke(&prompt).await?;

            let steps: Vec<Step> = response
                .content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(MAX_PLAN_STEPS)
                .enumerate()
                .map(|(i, description)| Step {
                    id: format!("step-{}", i + 1),
                    description: description.to_string(),
                    done: false,
                })
                .collect();

            let mut task = Task::new(uuid::Uuid::new_v4().to_string(), goal);
            task.steps = steps;
            task.tools = tool_specs
                .into_iter()
                .map(|t| ToolSpec {
                    name: t.name,
                    description: t.description.unwrap_or_default(),
                    input_schema: t.input_schema,
                })
                .collect();
            state.tasks.push(task);
        }

        if !state.tasks.is_empty() {
            state.current_task_index = state.tasks.len() - 1;
        }

        state.last_node = Some(NodeId::PlanningOrchestrator);
        state.current_graph_step += 1;
        let target = route(&mut state, &self.route_config);
        Ok((state, Next::Node(target.as_str().to_string())))
    }
}
