//! `AgentConfig`: the immutable runtime view of one agent's configuration.
//!
//! Loaded by the host application's storage layer and handed to the dispatcher; the engine
//! never fetches or persists it. `cfg_version` drives Runtime Cache invalidation (§4.7).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Interactive,
    Autonomous,
    Hybrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Reactive,
    Planned,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphConfig {
    pub max_graph_steps: u32,
    pub model_refs: Vec<String>,
    pub execution_mode: ExecutionMode,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_graph_steps: 500,
            model_refs: Vec::new(),
            execution_mode: ExecutionMode::Planned,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub stm_size: usize,
    pub ltm_size: usize,
    /// Minimum similarity score a retrieval hit must meet (`ltm.threshold`).
    pub ltm_threshold: f32,
    /// Retrieval fan-out (`ltm.k`).
    pub ltm_top_k: usize,
    pub insert_timeout_ms: u64,
    pub retrieve_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            stm_size: 5,
            ltm_size: 200,
            ltm_threshold: 0.0,
            ltm_top_k: 20,
            insert_timeout_ms: 2_000,
            retrieve_timeout_ms: 2_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RagConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub embedding_model: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            top_k: 5,
            embedding_model: String::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max: 3,
            base_delay_ms: 500,
        }
    }
}

/// Immutable snapshot of one agent's configuration, tagged with `cfg_version`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub user_id: String,
    pub profile: String,
    pub mode: AgentMode,
    pub graph: GraphConfig,
    pub memory: MemoryConfig,
    pub rag: RagConfig,
    pub retries: RetryConfig,
    pub tools: Vec<String>,
    pub prompts: std::collections::HashMap<String, String>,
    pub cfg_version: u64,
}

/// Errors raised validating an `AgentConfig` before it is used to build a runtime.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("agent config {0} has no model_refs")]
    NoModelRefs(String),
    #[error("agent config {0} has max_graph_steps = 0")]
    ZeroStepLimit(String),
    #[error("agent config {0} has stm_size = 0")]
    ZeroStmSize(String),
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.graph.model_refs.is_empty() {
            return Err(ConfigValidationError::NoModelRefs(self.id.clone()));
        }
        if self.graph.max_graph_steps == 0 {
            return Err(ConfigValidationError::ZeroStepLimit(self.id.clone()));
        }
        if self.memory.stm_size == 0 {
            return Err(ConfigValidationError::ZeroStmSize(self.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AgentConfig {
        AgentConfig {
            id: "agent-1".into(),
            user_id: "user-1".into(),
            profile: "default".into(),
            mode: AgentMode::Interactive,
            graph: GraphConfig {
                model_refs: vec!["mock-1".into()],
                ..GraphConfig::default()
            },
            memory: MemoryConfig::default(),
            rag: RagConfig::default(),
            retries: RetryConfig::default(),
            tools: vec!["calculator".into()],
            prompts: Default::default(),
            cfg_version: 1,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn missing_model_refs_is_rejected() {
        let mut cfg = sample();
        cfg.graph.model_refs.clear();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::NoModelRefs(_))
        ));
    }

    #[test]
    fn zero_step_limit_is_rejected() {
        let mut cfg = sample();
        cfg.graph.max_graph_steps = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::ZeroStepLimit(_))
        ));
    }
}
