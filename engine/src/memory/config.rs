//! Invoke config: thread_id, checkpoint_id, checkpoint_ns, user_id.
//!
//! Carried as `config["configurable"]` in the design this crate is grounded on; here it is a
//! plain struct passed to [`crate::graph::CompiledStateGraph::invoke`] and to
//! [`crate::memory::Checkpointer`] methods.

/// Config for a single invoke. Identifies the thread and optional checkpoint.
///
/// When using a checkpointer, `invoke` must provide at least `thread_id`.
#[derive(Debug, Clone, Default)]
pub struct RunnableConfig {
    /// Unique id for this conversation/thread. Required when using a checkpointer.
    pub thread_id: Option<String>,
    /// If set, load state from this checkpoint instead of the latest (time travel / branch).
    pub checkpoint_id: Option<String>,
    /// Optional namespace for checkpoints (e.g. subgraph). Default is empty.
    pub checkpoint_ns: String,
    /// Optional user id; used by `Store` for cross-thread memory namespacing.
    pub user_id: Option<String>,
    /// When set, the graph starts from this node instead of the first. Set by the dispatcher
    /// on resume, derived from the loaded checkpoint's `GraphState.last_node`.
    pub resume_from_node_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runnable_config_default_all_optionals_none_or_empty() {
        let c = RunnableConfig::default();
        assert!(c.thread_id.is_none());
        assert!(c.checkpoint_id.is_none());
        assert!(c.checkpoint_ns.is_empty());
        assert!(c.user_id.is_none());
        assert!(c.resume_from_node_id.is_none());
    }

    #[test]
    fn runnable_config_clone() {
        let c = RunnableConfig {
            thread_id: Some("t1".into()),
            checkpoint_id: Some("cp1".into()),
            checkpoint_ns: "ns".into(),
            user_id: Some("u1".into()),
            resume_from_node_id: Some("AGENT_EXECUTOR".into()),
        };
        let c2 = c.clone();
        assert_eq!(c.thread_id, c2.thread_id);
        assert_eq!(c.checkpoint_id, c2.checkpoint_id);
        assert_eq!(c.checkpoint_ns, c2.checkpoint_ns);
        assert_eq!(c.user_id, c2.user_id);
        assert_eq!(c.resume_from_node_id, c2.resume_from_node_id);
    }
}
