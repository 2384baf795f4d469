//! `MockLlm`: a fixed or scripted `LlmClient`, for tests and demos without a live provider.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::{Message, ToolCallRequest};

use super::{LlmClient, LlmResponse};

/// An `LlmClient` that returns pre-scripted responses, one per call, in order. The last
/// response is repeated once the script is exhausted so a run doesn't error out mid-graph.
pub struct MockLlm {
    responses: Mutex<Vec<LlmResponse>>,
}

impl MockLlm {
    /// A mock that always returns the same plain-text response.
    pub fn fixed(content: impl Into<String>) -> Self {
        Self::scripted(vec![LlmResponse {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
        }])
    }

    /// A mock that returns one tool call, then (on the next invocation) a plain reply.
    pub fn with_tool_call(call: ToolCallRequest, final_content: impl Into<String>) -> Self {
        Self::scripted(vec![
            LlmResponse {
                content: String::new(),
                tool_calls: vec![call],
                usage: None,
            },
            LlmResponse {
                content: final_content.into(),
                tool_calls: Vec::new(),
                usage: None,
            },
        ])
    }

    /// A mock that replays a fixed sequence of responses, one per `invoke` call.
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, AgentError> {
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(AgentError::Internal("MockLlm: no scripted responses".to_string())),
            1 => Ok(clone_response(&responses[0])),
            _ => Ok(responses.remove(0)),
        }
    }
}

fn clone_response(r: &LlmResponse) -> LlmResponse {
    LlmResponse {
        content: r.content.clone(),
        tool_calls: r.tool_calls.clone(),
        usage: r.usage.clone(),
    }
}
