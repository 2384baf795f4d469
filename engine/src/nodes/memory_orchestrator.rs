//! MEMORY_ORCHESTRATOR: folds new transcript messages into long-term memory, then
//! retrieves relevant context for the next executor step (§4.5).
//!
//! Ingest and retrieve are both best-effort: a timeout or store error degrades (skips the
//! batch, clears `state.rag`) rather than setting `state.error` — router rule 1 would end
//! the whole graph on any non-`BlockedTask` error, which is stronger than this section's
//! contract ("ingestion failures are logged and do not terminate the graph").

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{MemoryConfig, RagConfig};
use crate::error::AgentError;
use crate::graph::router::{route, RouteConfig};
use crate::graph::{Next, Node};
use crate::memory::Store;
use crate::message::Role;
use crate::state::{GraphState, NodeId, SimilarityHit};

pub struct MemoryOrchestratorNode {
    store: Arc<dyn Store>,
    user_id: String,
    memory_config: MemoryConfig,
    rag_config: RagConfig,
    route_config: RouteConfig,
}

impl MemoryOrchestratorNode {
    pub fn new(
        store: Arc<dyn Store>,
        user_id: impl Into<String>,
        memory_config: MemoryConfig,
        rag_config: RagConfig,
        route_config: RouteConfig,
    ) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            memory_config,
            rag_config,
            route_config,
        }
    }

    fn namespace(&self) -> Vec<String> {
        vec![self.user_id.clone(), "memories".to_string()]
    }

    async fn ingest(&self, state: &mut GraphState) {
        if self.user_id.is_empty() {
            return;
        }

        let start = state.ltm_ingested_count.min(state.messages.len());
        let pending: Vec<(usize, String)> = state.messages[start..]
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m.role, Role::Ai | Role::Tool))
            .map(|(i, m)| (start + i, m.content.clone()))
            .filter(|(_, content)| !content.trim().is_empty() && content.len() <= 10_000)
            .collect();

        let namespace = self.namespace();
        for (index, content) in pending {
            let key = uuid::Uuid::new_v4().to_string();
            let value = json!({ "content": content, "source_index": index });
            let put = self.store.put(&namespace, &key, &value);
            let timed = tokio::time::timeout(Duration::from_millis(self.memory_config.insert_timeout_ms), put).await;
            match timed {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "long-term memory ingest failed, skipping entry"),
                Err(_) => tracing::warn!("long-term memory ingest timed out, skipping entry"),
            }
        }

        state.ltm_ingested_count = state.messages.len();
    }

    async fn retrieve(&self, state: &mut GraphState) {
        if !self.rag_config.enabled || self.user_id.is_empty() {
            return;
        }

        let Some(task) = state.current_task() else {
            state.memories.ltm.clear();
            state.rag.clear();
            return;
        };
        let query = task.text.clone();

        let options = crate::memory::SearchOptions::new()
            .with_query(query)
            .with_limit(self.memory_config.ltm_top_k);
        let namespace = self.namespace();
        let search = self.store.search(&namespace, options);
        let timed = tokio::time::timeout(Duration::from_millis(self.memory_config.retrieve_timeout_ms), search).await;

        let hits = match timed {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "long-term memory retrieval failed, degrading to empty context");
                state.memories.ltm.clear();
                state.rag.clear();
                return;
            }
            Err(_) => {
                tracing::warn!("long-term memory retrieval timed out, degrading to empty context");
                state.memories.ltm.clear();
                state.rag.clear();
                return;
            }
        };

        let threshold = self.memory_config.ltm_threshold as f64;
        let similarity_hits: Vec<SimilarityHit> = hits
            .into_iter()
            .filter(|hit| hit.score.unwrap_or(0.0) >= threshold)
            .map(|hit| SimilarityHit {
                content: hit.item.value.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                score: hit.score.unwrap_or(0.0) as f32,
                category: None,
            })
            .collect();

        state.rag = similarity_hits
            .iter()
            .map(|h| h.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        state.memories.ltm = similarity_hits;
    }
}

#[async_trait]
impl Node<GraphState> for MemoryOrchestratorNode {
    fn id(&self) -> &str {
        NodeId::MemoryOrchestrator.as_str()
    }

    async fn run(&self, mut state: GraphState) -> Result<(GraphState, Next), AgentError> {
        self.ingest(&mut state).await;
        self.retrieve(&mut state).await;

        state.last_node = Some(NodeId::MemoryOrchestrator);
        state.current_graph_step += 1;
        let target = route(&mut state, &self.route_config);
        Ok((state, Next::Node(target.as_str().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentMode, ExecutionMode};
    use crate::memory::{Item, ListNamespacesOptions, SearchItem, StoreOp, StoreOpResult};
    use crate::message::Message;
    use crate::state::{Task, TaskStatus};
    use dashmap::DashMap;

    struct RecordingStore {
        puts: DashMap<String, serde_json::Value>,
        search_hits: Vec<SearchItem>,
    }

    impl RecordingStore {
        fn new(search_hits: Vec<SearchItem>) -> Self {
            Self { puts: DashMap::new(), search_hits }
        }
    }

    #[async_trait]
    impl Store for RecordingStore {
        async fn put(&self, _namespace: &Vec<String>, key: &str, value: &serde_json::Value) -> Result<(), crate::memory::StoreError> {
            self.puts.insert(key.to_string(), value.clone());
            Ok(())
        }

        async fn get(&self, _namespace: &Vec<String>, _key: &str) -> Result<Option<serde_json::Value>, crate::memory::StoreError> {
            Ok(None)
        }

        async fn get_item(&self, _namespace: &Vec<String>, _key: &str) -> Result<Option<Item>, crate::memory::StoreError> {
            Ok(None)
        }

        async fn delete(&self, _namespace: &Vec<String>, _key: &str) -> Result<(), crate::memory::StoreError> {
            Ok(())
        }

        async fn list(&self, _namespace: &Vec<String>) -> Result<Vec<String>, crate::memory::StoreError> {
            Ok(vec![])
        }

        async fn search(
            &self,
            _namespace_prefix: &Vec<String>,
            _options: crate::memory::SearchOptions,
        ) -> Result<Vec<SearchItem>, crate::memory::StoreError> {
            Ok(self.search_hits.clone())
        }

        async fn list_namespaces(&self, _options: ListNamespacesOptions) -> Result<Vec<Vec<String>>, crate::memory::StoreError> {
            Ok(vec![])
        }

        async fn batch(&self, _ops: Vec<StoreOp>) -> Result<Vec<StoreOpResult>, crate::memory::StoreError> {
            Ok(vec![])
        }
    }

    fn route_config() -> RouteConfig {
        RouteConfig { max_graph_steps: 500, mode: AgentMode::Autonomous, execution_mode: ExecutionMode::Planned }
    }

    #[tokio::test]
    async fn ingests_only_ai_and_tool_messages_once() {
        let store = Arc::new(RecordingStore::new(vec![]));
        let node = MemoryOrchestratorNode::new(
            store.clone(),
            "user-1",
            MemoryConfig::default(),
            RagConfig::default(),
            route_config(),
        );
        let mut state = GraphState::default();
        state.messages.push(Message::human("hi"));
        state.messages.push(Message::ai("hello there"));
        state.messages.push(Message::tool("4", "c1", "calculator"));

        let (state, _) = node.run(state).await.unwrap();
        assert_eq!(state.ltm_ingested_count, 3);
        assert_eq!(store.puts.len(), 2);
    }

    #[tokio::test]
    async fn does_not_reingest_already_ingested_messages() {
        let store = Arc::new(RecordingStore::new(vec![]));
        let node = MemoryOrchestratorNode::new(
            store.clone(),
            "user-1",
            MemoryConfig::default(),
            RagConfig::default(),
            route_config(),
        );
        let mut state = GraphState::default();
        state.messages.push(Message::ai("first"));
        state.ltm_ingested_count = 1;
        state.messages.push(Message::ai("second"));

        let (state, _) = node.run(state).await.unwrap();
        assert_eq!(state.ltm_ingested_count, 2);
        assert_eq!(store.puts.len(), 1);
    }

    #[tokio::test]
    async fn retrieve_disabled_leaves_rag_empty() {
        let store = Arc::new(RecordingStore::new(vec![]));
        let node = MemoryOrchestratorNode::new(
            store,
            "user-1",
            MemoryConfig::default(),
            RagConfig::default(),
            route_config(),
        );
        let mut state = GraphState::default();
        state.tasks.push(Task::new("t1", "goal"));
        let (state, _) = node.run(state).await.unwrap();
        assert!(state.rag.is_empty());
        assert!(state.memories.ltm.is_empty());
    }

    #[tokio::test]
    async fn retrieve_enabled_filters_by_threshold() {
        let item_high = Item::new(vec!["user-1".into(), "memories".into()], "k1".into(), json!({"content": "relevant fact"}));
        let item_low = Item::new(vec!["user-1".into(), "memories".into()], "k2".into(), json!({"content": "irrelevant"}));
        let hits = vec![SearchItem::with_score(item_high, 0.9), SearchItem::with_score(item_low, 0.1)];
        let store = Arc::new(RecordingStore::new(hits));
        let mut memory_config = MemoryConfig::default();
        memory_config.ltm_threshold = 0.5;
        let rag_config = RagConfig { enabled: true, ..RagConfig::default() };
        let node = MemoryOrchestratorNode::new(store, "user-1", memory_config, rag_config, route_config());

        let mut state = GraphState::default();
        state.tasks.push(Task::new("t1", "goal"));
        let (state, _) = node.run(state).await.unwrap();
        assert_eq!(state.memories.ltm.len(), 1);
        assert_eq!(state.memories.ltm[0].content, "relevant fact");
    }

    #[tokio::test]
    async fn always_routes_onward_after_terminal_task() {
        let store = Arc::new(RecordingStore::new(vec![]));
        let node = MemoryOrchestratorNode::new(store, "user-1", MemoryConfig::default(), RagConfig::default(), route_config());
        let mut state = GraphState::default();
        let mut task = Task::new("t1", "goal");
        task.status = TaskStatus::Completed;
        state.tasks.push(task);
        let (_, next) = node.run(state).await.unwrap();
        assert_eq!(next, Next::Node(NodeId::PlanningOrchestrator.as_str().to_string()));
    }
}
