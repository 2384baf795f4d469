//! `AgentDirectory`: the host application's storage interface for agent config and chat
//! history (§6 "Storage interface"). The engine never reads or writes this storage directly
//! outside the Request Dispatcher, which uses it to load config before building/refreshing a
//! cached graph and to persist assistant turns as they complete.

use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::message::Message;

/// Errors raised by an `AgentDirectory` implementation.
#[derive(Debug, thiserror::Error)]
pub enum AgentDirectoryError {
    #[error("agent not found: {0}")]
    NotFound(String),
    #[error("access denied: user {user_id} does not own agent {agent_id}")]
    AccessDenied { agent_id: String, user_id: String },
    #[error("storage: {0}")]
    Storage(String),
}

/// Host-provided storage for agent configuration and chat history. Implementations back
/// this with whatever the host already uses (Postgres, a document store, ...); the engine
/// depends only on this trait.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Loads the current config for `agent_id`, verifying `user_id` owns it.
    ///
    /// Returns `AccessDenied` (not `NotFound`) when the agent exists under a different
    /// owner, so the dispatcher never leaks whether an id is valid to a caller who
    /// doesn't own it (§4.8 step 1).
    async fn load_agent(
        &self,
        agent_id: &str,
        user_id: &str,
    ) -> Result<AgentConfig, AgentDirectoryError>;

    /// Appends one message to the thread's durable history (§6 `insert_message(agent_id,
    /// user_id, event)`).
    async fn insert_message(
        &self,
        agent_id: &str,
        user_id: &str,
        thread_id: &str,
        message: &Message,
    ) -> Result<(), AgentDirectoryError>;

    /// Returns a page of the thread's durable history in insertion order (§6
    /// `get_messages(agent_id, thread_id, user_id, limit, offset)`).
    async fn get_messages(
        &self,
        agent_id: &str,
        user_id: &str,
        thread_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Message>, AgentDirectoryError>;
}

/// In-process `AgentDirectory` backed by a `DashMap`, for tests and demos.
pub struct InMemoryAgentDirectory {
    configs: dashmap::DashMap<String, AgentConfig>,
    messages: dashmap::DashMap<(String, String), Vec<Message>>,
}

impl InMemoryAgentDirectory {
    pub fn new() -> Self {
        Self {
            configs: dashmap::DashMap::new(),
            messages: dashmap::DashMap::new(),
        }
    }

    /// Registers or replaces an agent's config, bumping nothing automatically — callers
    /// control `cfg_version` explicitly so cache-invalidation tests can force a mismatch.
    pub fn put_config(&self, config: AgentConfig) {
        self.configs.insert(config.id.clone(), config);
    }
}

impl Default for InMemoryAgentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn load_agent(
        &self,
        agent_id: &str,
        user_id: &str,
    ) -> Result<AgentConfig, AgentDirectoryError> {
        let config = self
            .configs
            .get(agent_id)
            .ok_or_else(|| AgentDirectoryError::NotFound(agent_id.to_string()))?;
        if config.user_id != user_id {
            return Err(AgentDirectoryError::AccessDenied {
                agent_id: agent_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
        Ok(config.clone())
    }

    async fn insert_message(
        &self,
        agent_id: &str,
        _user_id: &str,
        thread_id: &str,
        message: &Message,
    ) -> Result<(), AgentDirectoryError> {
        self.messages
            .entry((agent_id.to_string(), thread_id.to_string()))
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn get_messages(
        &self,
        agent_id: &str,
        _user_id: &str,
        thread_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Message>, AgentDirectoryError> {
        let all = self
            .messages
            .get(&(agent_id.to_string(), thread_id.to_string()))
            .map(|v| v.clone())
            .unwrap_or_default();
        let page = all.into_iter().skip(offset);
        Ok(match limit {
            Some(n) => page.take(n).collect(),
            None => page.collect(),
        })
    }
}
