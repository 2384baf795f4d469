//! Conversation message type shared by state, LLM client, and wire layers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Human,
    Ai,
    Tool,
}

/// A single chat message in `GraphState.messages`.
///
/// `additional` carries the small set of out-of-band fields nodes and the dispatcher
/// stamp onto a message without widening the struct for every new concern: `final`
/// (this is the terminal assistant reply), `from` (producing node id), `taskCompleted`
/// / `taskSuccess` (Verifier's per-task verdict), `error` (error kind tag when this
/// message documents a failure), `graph_step` (the `currentGraphStep` value when the
/// message was appended).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Present only on `Role::Tool` messages: the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional: HashMap<String, Value>,
}

/// A tool call requested by the model, attached to an `Ai` message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::plain(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::plain(Role::Ai, content)
    }

    pub fn ai_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Ai, content)
        }
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            additional: HashMap::new(),
        }
    }

    pub fn with_additional(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional.insert(key.into(), value.into());
        self
    }

    /// `additional["final"] == true`: this message is the run's terminal assistant reply.
    pub fn is_final(&self) -> bool {
        self.additional.get("final").and_then(Value::as_bool).unwrap_or(false)
    }

    /// `additional["from"]`: the node id that produced this message, if stamped.
    pub fn from_node(&self) -> Option<&str> {
        self.additional.get("from").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_and_ai_constructors_set_role_and_content() {
        let m = Message::human("hi");
        assert_eq!(m.role, Role::Human);
        assert_eq!(m.content, "hi");
        assert!(m.tool_calls.is_empty());
    }

    #[test]
    fn is_final_reads_additional_flag() {
        let m = Message::ai("done").with_additional("final", true);
        assert!(m.is_final());
        assert!(!Message::ai("not done").is_final());
    }

    #[test]
    fn tool_message_carries_call_id_and_name() {
        let m = Message::tool("42", "call-1", "calculator");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(m.name.as_deref(), Some("calculator"));
    }

    #[test]
    fn serializes_without_empty_optional_fields() {
        let m = Message::human("hi");
        let v = serde_json::to_value(&m).unwrap();
        assert!(v.get("tool_call_id").is_none());
        assert!(v.get("additional").is_none());
    }
}
