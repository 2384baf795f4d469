//! Envelope + metadata: the run-scoped fields merged onto every [`ProtocolEvent`].
//!
//! Wire shape: `{event, run_id, thread_id, checkpoint_id, from, ts, content?, tools?,
//! plan?, metadata: {...}}`. `Envelope` carries the top-level routing fields; `RunMetadata`
//! carries the nested `metadata` object (LangSmith-style tracing fields the dispatcher
//! threads through unchanged so downstream consumers can correlate runs).

use crate::event::ProtocolEvent;
use serde::Serialize;
use serde_json::Value;

/// Top-level envelope fields merged onto every emitted event.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub run_id: String,
    pub thread_id: String,
    pub checkpoint_id: Option<String>,
    pub from: String,
    pub ts: String,
}

impl Envelope {
    pub fn new(run_id: impl Into<String>, thread_id: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            thread_id: thread_id.into(),
            checkpoint_id: None,
            from: String::new(),
            ts: ts.into(),
        }
    }

    pub fn with_checkpoint_id(mut self, id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(id.into());
        self
    }

    pub fn with_from(mut self, node_id: impl Into<String>) -> Self {
        self.from = node_id.into();
        self
    }
}

/// Nested `metadata` object carried on every event.
#[derive(Clone, Debug, Serialize)]
pub struct RunMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub langgraph_step: u64,
    pub langgraph_node: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<crate::event::TokensWire>,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub execution_mode: String,
    pub ls_provider: String,
    pub ls_model_name: String,
    pub ls_model_type: String,
    pub ls_temperature: f32,
}

/// Merges event payload, envelope, and metadata into the final wire object.
pub fn to_json(
    event: &ProtocolEvent,
    envelope: &Envelope,
    metadata: &RunMetadata,
) -> Result<Value, serde_json::Error> {
    let mut obj = match event.to_value()? {
        Value::Object(m) => m,
        other => {
            let mut m = serde_json::Map::new();
            m.insert("event".to_string(), other);
            m
        }
    };
    obj.insert("run_id".to_string(), Value::String(envelope.run_id.clone()));
    obj.insert(
        "thread_id".to_string(),
        Value::String(envelope.thread_id.clone()),
    );
    obj.insert(
        "checkpoint_id".to_string(),
        match &envelope.checkpoint_id {
            Some(id) => Value::String(id.clone()),
            None => Value::Null,
        },
    );
    obj.insert("from".to_string(), Value::String(envelope.from.clone()));
    obj.insert("ts".to_string(), Value::String(envelope.ts.clone()));
    obj.insert("metadata".to_string(), serde_json::to_value(metadata)?);
    Ok(Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> RunMetadata {
        RunMetadata {
            conversation_id: Some("conv-1".into()),
            langgraph_step: 2,
            langgraph_node: "agent_executor".into(),
            tokens: None,
            is_final: false,
            execution_mode: "reactive".into(),
            ls_provider: "mock".into(),
            ls_model_name: "mock-1".into(),
            ls_model_type: "chat".into(),
            ls_temperature: 0.0,
        }
    }

    #[test]
    fn merges_envelope_and_metadata_onto_event() {
        let ev = ProtocolEvent::OnChainEnd { plan: None, error: None };
        let envelope = Envelope::new("run-1", "thread-1", "2026-07-28T00:00:00Z")
            .with_checkpoint_id("1")
            .with_from("END_GRAPH");
        let value = to_json(&ev, &envelope, &sample_metadata()).unwrap();
        assert_eq!(value["event"], "on_chain_end");
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["thread_id"], "thread-1");
        assert_eq!(value["checkpoint_id"], "1");
        assert_eq!(value["from"], "END_GRAPH");
        assert_eq!(value["metadata"]["langgraph_node"], "agent_executor");
        assert_eq!(value["metadata"]["final"], false);
    }

    #[test]
    fn missing_checkpoint_id_serializes_to_null() {
        let ev = ProtocolEvent::OnError {
            kind: "timeout".into(),
            message: "deadline exceeded".into(),
        };
        let envelope = Envelope::new("run-2", "thread-2", "2026-07-28T00:00:01Z").with_from("AGENT_EXECUTOR");
        let value = to_json(&ev, &envelope, &sample_metadata()).unwrap();
        assert!(value["checkpoint_id"].is_null());
        assert_eq!(value["kind"], "timeout");
    }
}
