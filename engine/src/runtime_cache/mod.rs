//! Runtime Cache: pools compiled agent graphs so the dispatcher doesn't rebuild one on
//! every request (§4.7).
//!
//! Kept as its own module rather than an instance of the teacher's generic `cache::Cache<K,
//! V>` (see `DESIGN.md`): a `CompiledStateGraph<GraphState>` handle needs ref-counted
//! checkout semantics (`acquire`/`release`) and a `cfg_version`-aware rebuild path that a
//! plain get/set/TTL cache doesn't model. `dashmap` is carried over from the teacher's stack
//! for the concurrent map; per-`agent_id` serialization uses one `tokio::sync::Mutex<()>`
//! per key so `acquire` never observes a half-built entry (§9).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::graph::CompiledStateGraph;
use crate::state::GraphState;

/// Errors raised by `RuntimeCache` operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache entry for agent {0}")]
    NotFound(String),
    #[error("rebuild failed for agent {0}: {1}")]
    RebuildFailed(String, String),
}

/// A rebuild closure bound to one agent's config snapshot; invoked by `invalidate` and by
/// `seed`'s caller on first build. `'static` so entries outlive the request that seeded them.
pub type RebuildFuture = Pin<Box<dyn Future<Output = Result<CompiledStateGraph<GraphState>, String>> + Send>>;
pub type RebuildFn = Arc<dyn Fn() -> RebuildFuture + Send + Sync>;

/// Bookkeeping shared between a `CacheEntry` and every `CacheLease` checked out from it, so
/// `CacheLease::drop` can decrement `ref_count` without an async `Drop` impl.
struct Shared {
    ref_count: AtomicU64,
    last_access: StdMutex<Instant>,
}

impl Shared {
    fn new() -> Self {
        Self {
            ref_count: AtomicU64::new(0),
            last_access: StdMutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock().unwrap() = Instant::now();
    }

    fn last_access(&self) -> Instant {
        *self.last_access.lock().unwrap()
    }
}

/// One pooled entry: a compiled graph handle plus the metadata needed to validate,
/// refresh, and evict it (§3 `RuntimeCache entry`).
pub struct CacheEntry {
    pub agent_id: String,
    pub user_id: String,
    pub cfg_version: u64,
    pub compiled_graph_handle: Arc<CompiledStateGraph<GraphState>>,
    rebuild_fn: RebuildFn,
    ttl: Option<Duration>,
    expires_at: Option<Instant>,
    shared: Arc<Shared>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }

    fn is_pinned(&self) -> bool {
        self.shared.ref_count.load(Ordering::SeqCst) > 0
    }
}

/// RAII checkout of a `CacheEntry`. Holds the graph handle and a clone of the entry's shared
/// ref-count; dropping it always releases the lease, even if the holder panics or a node
/// short-circuits with `?` — matching §9's "acquire/release must use RAII-style scoped
/// guards... so that a crash in node code still releases the handle."
pub struct CacheLease {
    agent_id: String,
    cfg_version: u64,
    graph: Arc<CompiledStateGraph<GraphState>>,
    shared: Arc<Shared>,
}

impl CacheLease {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn cfg_version(&self) -> u64 {
        self.cfg_version
    }

    pub fn graph(&self) -> &Arc<CompiledStateGraph<GraphState>> {
        &self.graph
    }
}

impl Drop for CacheLease {
    fn drop(&mut self) {
        self.shared.ref_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Compiled-graph pool keyed by `agent_id` (§4.7).
pub struct RuntimeCache {
    entries: DashMap<String, CacheEntry>,
    key_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    max_entries: usize,
}

impl RuntimeCache {
    /// `max_entries` is a hard cap (clamped to at least 1); over capacity, unpinned entries
    /// are evicted in least-recently-used order.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            key_locks: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    fn key_lock(&self, agent_id: &str) -> Arc<AsyncMutex<()>> {
        self.key_locks
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Non-null iff a fresh, unexpired entry exists; increments `ref_count` and touches
    /// `last_access`.
    pub async fn acquire(&self, agent_id: &str) -> Option<CacheLease> {
        let lock = self.key_lock(agent_id);
        let _guard = lock.lock().await;

        let mut entry = self.entries.get_mut(agent_id)?;
        if entry.is_expired() && !entry.is_pinned() {
            drop(entry);
            self.entries.remove(agent_id);
            return None;
        }
        entry.shared.ref_count.fetch_add(1, Ordering::SeqCst);
        entry.shared.touch();
        Some(CacheLease {
            agent_id: agent_id.to_string(),
            cfg_version: entry.cfg_version,
            graph: entry.compiled_graph_handle.clone(),
            shared: entry.shared.clone(),
        })
    }

    /// Manual decrement for callers not holding a `CacheLease`. Prefer the RAII form.
    pub fn release(&self, agent_id: &str) {
        if let Some(entry) = self.entries.get(agent_id) {
            entry.shared.ref_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Inserts or refreshes an entry. If one already exists at the same `cfg_version` and
    /// isn't expired, only extends the expiry and rebinds `rebuild_fn` (no graph rebuild).
    pub async fn seed(
        &self,
        agent_id: &str,
        user_id: impl Into<String>,
        cfg_version: u64,
        graph: CompiledStateGraph<GraphState>,
        rebuild_fn: RebuildFn,
        ttl: Option<Duration>,
    ) {
        let lock = self.key_lock(agent_id);
        let _guard = lock.lock().await;

        if let Some(mut existing) = self.entries.get_mut(agent_id) {
            if existing.cfg_version == cfg_version && !existing.is_expired() {
                existing.ttl = ttl;
                existing.expires_at = ttl.map(|d| Instant::now() + d);
                existing.rebuild_fn = rebuild_fn;
                return;
            }
        }

        let entry = CacheEntry {
            agent_id: agent_id.to_string(),
            user_id: user_id.into(),
            cfg_version,
            compiled_graph_handle: Arc::new(graph),
            rebuild_fn,
            ttl,
            expires_at: ttl.map(|d| Instant::now() + d),
            shared: Arc::new(Shared::new()),
        };
        self.entries.insert(agent_id.to_string(), entry);
        self.evict_over_capacity();
    }

    /// Rebuilds the entry's graph via its `rebuild_fn`. On success, swaps in the new handle
    /// under the new `cfg_version` (existing leases keep their old `Arc` until dropped). On
    /// failure, evicts the stale entry and surfaces the error.
    pub async fn invalidate(&self, agent_id: &str, cfg_version: u64) -> Result<(), CacheError> {
        let lock = self.key_lock(agent_id);
        let _guard = lock.lock().await;

        let rebuild_fn = {
            let entry = self
                .entries
                .get(agent_id)
                .ok_or_else(|| CacheError::NotFound(agent_id.to_string()))?;
            entry.rebuild_fn.clone()
        };

        match rebuild_fn().await {
            Ok(graph) => {
                let mut entry = self
                    .entries
                    .get_mut(agent_id)
                    .ok_or_else(|| CacheError::NotFound(agent_id.to_string()))?;
                entry.compiled_graph_handle = Arc::new(graph);
                entry.cfg_version = cfg_version;
                entry.shared.touch();
                Ok(())
            }
            Err(message) => {
                self.entries.remove(agent_id);
                Err(CacheError::RebuildFailed(agent_id.to_string(), message))
            }
        }
    }

    /// Evicts unpinned entries in least-recently-used order until at or under `max_entries`.
    /// If every entry is pinned and capacity is still exceeded, logs a warning and stops.
    fn evict_over_capacity(&self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        loop {
            if self.entries.len() <= self.max_entries {
                return;
            }
            let lru_key: Option<(String, Instant)> = self
                .entries
                .iter()
                .filter(|e| !e.is_pinned())
                .map(|e| (e.key().clone(), e.shared.last_access()))
                .min_by_key(|(_, last_access)| *last_access);

            match lru_key {
                Some((key, _)) => {
                    self.entries.remove(&key);
                }
                None => {
                    tracing::warn!(
                        count = self.entries.len(),
                        max = self.max_entries,
                        "runtime cache over capacity with only pinned entries"
                    );
                    return;
                }
            }
        }
    }

    /// Drops expired, unpinned entries. Cheap diagnostic used by tests and the dispatcher's
    /// idle sweep; `acquire` and `seed` already prune lazily on the keys they touch.
    pub fn sweep_expired(&self) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_expired() && !e.is_pinned())
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.entries.contains_key(agent_id)
    }

    /// `cfg_version` currently pooled for `agent_id`, if any.
    pub fn cfg_version(&self, agent_id: &str) -> Option<u64> {
        self.entries.get(agent_id).map(|e| e.cfg_version)
    }
}

impl Default for RuntimeCache {
    fn default() -> Self {
        Self::new(128)
    }
}

/// Snapshot of per-key reference counts, for diagnostics and tests.
pub fn ref_counts(cache: &RuntimeCache) -> HashMap<String, u64> {
    cache
        .entries
        .iter()
        .map(|e| (e.key().clone(), e.shared.ref_count.load(Ordering::SeqCst)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentMode, ExecutionMode};
    use crate::graph::router::RouteConfig;
    use crate::graph::StateGraph;
    use crate::llm::MockLlm;
    use crate::memory::{InMemoryStore, MemorySaver};
    use crate::nodes::{build_graph, GraphDeps};
    use crate::tools::StaticToolSource;
    use crate::constraints::ExecutionConstraints;

    fn dummy_graph() -> CompiledStateGraph<GraphState> {
        let mut graph = StateGraph::<GraphState>::new();
        graph.add_node("only", Arc::new(crate::nodes::EndGraphNode::new()));
        graph.add_edge(crate::graph::START, "only");
        graph.add_edge("only", crate::graph::END);
        graph.compile().expect("trivial graph compiles")
    }

    fn noop_rebuild() -> RebuildFn {
        Arc::new(|| Box::pin(async { Ok(dummy_graph()) }))
    }

    #[tokio::test]
    async fn acquire_on_empty_cache_misses() {
        let cache = RuntimeCache::new(4);
        assert!(cache.acquire("agent-1").await.is_none());
    }

    #[tokio::test]
    async fn seed_then_acquire_hits_and_increments_ref_count() {
        let cache = RuntimeCache::new(4);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        let lease = cache.acquire("agent-1").await.expect("seeded entry present");
        assert_eq!(lease.cfg_version(), 1);
        assert_eq!(ref_counts(&cache)["agent-1"], 1);
        drop(lease);
        assert_eq!(ref_counts(&cache)["agent-1"], 0);
    }

    #[tokio::test]
    async fn seed_same_cfg_version_does_not_rebuild_graph() {
        let cache = RuntimeCache::new(4);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        let before = cache.acquire("agent-1").await.unwrap();
        let handle_before = Arc::as_ptr(before.graph());
        drop(before);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        let after = cache.acquire("agent-1").await.unwrap();
        assert_eq!(handle_before, Arc::as_ptr(after.graph()));
    }

    #[tokio::test]
    async fn invalidate_swaps_handle_and_bumps_cfg_version() {
        let cache = RuntimeCache::new(4);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        cache.invalidate("agent-1", 2).await.unwrap();
        assert_eq!(cache.cfg_version("agent-1"), Some(2));
    }

    #[tokio::test]
    async fn invalidate_on_missing_agent_errors() {
        let cache = RuntimeCache::new(4);
        let err = cache.invalidate("nope", 2).await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalidate_failure_evicts_entry() {
        let cache = RuntimeCache::new(4);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        let failing: RebuildFn = Arc::new(|| Box::pin(async { Err("boom".to_string()) }));
        cache.seed("agent-1", "user-1", 1, dummy_graph(), failing, None).await;
        let err = cache.invalidate("agent-1", 2).await.unwrap_err();
        assert!(matches!(err, CacheError::RebuildFailed(_, _)));
        assert!(!cache.contains("agent-1"));
    }

    #[tokio::test]
    async fn pinned_entries_survive_capacity_eviction() {
        let cache = RuntimeCache::new(1);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        let _lease = cache.acquire("agent-1").await.unwrap();
        cache.seed("agent-2", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        assert!(cache.contains("agent-1"));
    }

    #[tokio::test]
    async fn unpinned_lru_entry_evicted_over_capacity() {
        let cache = RuntimeCache::new(1);
        cache.seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        cache.seed("agent-2", "user-1", 1, dummy_graph(), noop_rebuild(), None).await;
        assert!(!cache.contains("agent-1"));
        assert!(cache.contains("agent-2"));
    }

    #[tokio::test]
    async fn expired_unpinned_entry_is_pruned_on_acquire() {
        let cache = RuntimeCache::new(4);
        cache
            .seed("agent-1", "user-1", 1, dummy_graph(), noop_rebuild(), Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.acquire("agent-1").await.is_none());
        assert!(!cache.contains("agent-1"));
    }

    #[tokio::test]
    async fn concurrent_acquire_during_invalidate_keeps_old_version_until_release() {
        let cache = Arc::new(RuntimeCache::new(8));
        cache.seed("agent-1", "user-1", 7, dummy_graph(), noop_rebuild(), None).await;

        let mut leases = Vec::new();
        for _ in 0..5 {
            leases.push(cache.acquire("agent-1").await.unwrap());
        }
        for lease in &leases {
            assert_eq!(lease.cfg_version(), 7);
        }

        cache.invalidate("agent-1", 8).await.unwrap();
        assert_eq!(cache.cfg_version("agent-1"), Some(8));
        for lease in &leases {
            assert_eq!(lease.cfg_version(), 7);
        }

        drop(leases);
        assert_eq!(ref_counts(&cache)["agent-1"], 0);
    }

    #[allow(dead_code)]
    fn route_config() -> RouteConfig {
        RouteConfig { max_graph_steps: 500, mode: AgentMode::Autonomous, execution_mode: ExecutionMode::Planned }
    }

    #[allow(dead_code)]
    fn real_graph_deps() -> GraphDeps {
        GraphDeps {
            llm: Arc::new(MockLlm::fixed("ok")),
            tools: Arc::new(StaticToolSource::new(vec![])),
            store: Arc::new(InMemoryStore::new()),
            checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
            constraints: ExecutionConstraints::default(),
        }
    }
}
