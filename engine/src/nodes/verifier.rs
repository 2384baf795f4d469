//! TASK_VERIFIER: judges the current task's trajectory as completed, failed, or needing
//! another attempt (§4.4).
//!
//! Heuristic rather than LLM-judged: a task is `completed` once the executor has
//! successfully called `end_task` (tracked via `ConstraintsState::completion_attempts`,
//! the only public signal the constraints module exposes) and the terminal reply carries
//! text; otherwise it's retried up to `MAX_TASK_RETRIES` times before failing outright.
//! Unconditionally jumps to `TASK_UPDATER` — it never calls `route`, matching the fixed
//! edge documented in `graph::router`.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::state::{GraphState, NodeId, TaskStatus};

/// Matches §4.4's "`retry < max_retries (3)`".
const MAX_TASK_RETRIES: u32 = 3;

pub struct TaskVerifierNode;

impl TaskVerifierNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TaskVerifierNode {
    fn default() -> Self {
        Self::new()
    }
}

enum Verdict {
    Completed,
    Failed,
    NeedsRetry,
}

#[async_trait]
impl Node<GraphState> for TaskVerifierNode {
    fn id(&self) -> &str {
        NodeId::TaskVerifier.as_str()
    }

    async fn run(&self, mut state: GraphState) -> Result<(GraphState, Next), AgentError> {
        let last_reply_has_content = state
            .messages
            .last()
            .map(|m| !m.content.trim().is_empty())
            .unwrap_or(false);
        let retry = state.retry;

        let task = state
            .current_task_mut()
            .ok_or_else(|| AgentError::Internal("verifier ran with no current task".into()))?;

        let verdict = if task.constraints.completion_attempts > 0 && last_reply_has_content {
            Verdict::Completed
        } else if retry < MAX_TASK_RETRIES {
            Verdict::NeedsRetry
        } else {
            Verdict::Failed
        };

        match verdict {
            Verdict::Completed => {
                task.status = TaskStatus::Completed;
                state.retry = 0;
            }
            Verdict::Failed => {
                task.status = TaskStatus::Failed;
                state.retry = 0;
            }
            Verdict::NeedsRetry => {
                task.status = TaskStatus::InProgress;
                task.constraints.step_in_progress = false;
                state.retry += 1;
            }
        }

        state.last_node = Some(NodeId::TaskVerifier);
        state.current_graph_step += 1;
        Ok((state, Next::Node(NodeId::TaskUpdater.as_str().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::state::Task;

    #[tokio::test]
    async fn end_task_with_reply_completes() {
        let mut state = GraphState::default();
        let mut task = Task::new("t1", "do thing");
        task.constraints.completion_attempts = 1;
        state.tasks.push(task);
        state.messages.push(Message::ai("all done"));

        let (state, next) = TaskVerifierNode::new().run(state).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::Completed);
        assert_eq!(next, Next::Node(NodeId::TaskUpdater.as_str().to_string()));
    }

    #[tokio::test]
    async fn no_end_task_retries_until_limit() {
        let mut state = GraphState::default();
        state.tasks.push(Task::new("t1", "do thing"));
        state.messages.push(Message::ai(""));
        state.retry = 0;

        let (state, _) = TaskVerifierNode::new().run(state).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(state.retry, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_fails_task() {
        let mut state = GraphState::default();
        state.tasks.push(Task::new("t1", "do thing"));
        state.messages.push(Message::ai(""));
        state.retry = MAX_TASK_RETRIES;

        let (state, _) = TaskVerifierNode::new().run(state).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::Failed);
        assert_eq!(state.retry, 0);
    }

    #[tokio::test]
    async fn errors_with_no_current_task() {
        let state = GraphState::default();
        let err = TaskVerifierNode::new().run(state).await.unwrap_err();
        assert!(matches!(err, AgentError::Internal(_)));
    }
}
