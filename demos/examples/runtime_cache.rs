//! Seeds the Runtime Cache with a compiled graph, acquires a lease, then invalidates the
//! entry to simulate a config change triggering a rebuild.
//!
//! Run: `cargo run -p demos --example runtime_cache`

use std::sync::Arc;

use engine::config::{AgentConfig, AgentMode, ExecutionMode, GraphConfig, MemoryConfig, RagConfig, RetryConfig};
use engine::constraints::ExecutionConstraints;
use engine::llm::MockLlm;
use engine::memory::{InMemoryStore, MemorySaver};
use engine::nodes::{build_graph, GraphDeps};
use engine::runtime_cache::RuntimeCache;
use engine::state::GraphState;
use engine::tools::StaticToolSource;

fn sample_config(cfg_version: u64) -> AgentConfig {
    AgentConfig {
        id: "demo-agent".into(),
        user_id: "demo-user".into(),
        profile: "default".into(),
        mode: AgentMode::Interactive,
        graph: GraphConfig {
            max_graph_steps: 6,
            model_refs: vec!["mock-1".into()],
            execution_mode: ExecutionMode::Reactive,
        },
        memory: MemoryConfig::default(),
        rag: RagConfig::default(),
        retries: RetryConfig::default(),
        tools: vec![],
        prompts: Default::default(),
        cfg_version,
    }
}

fn deps() -> GraphDeps {
    GraphDeps {
        llm: Arc::new(MockLlm::fixed("ok")),
        tools: Arc::new(StaticToolSource::new(vec![])),
        store: Arc::new(InMemoryStore::new()),
        checkpointer: Arc::new(MemorySaver::<GraphState>::new()),
        constraints: ExecutionConstraints::default(),
    }
}

#[tokio::main]
async fn main() {
    let cache = RuntimeCache::new(16);

    let graph = build_graph(&sample_config(1), deps()).expect("graph compiles");
    let rebuild: engine::runtime_cache::RebuildFn = Arc::new(|| {
        Box::pin(async { build_graph(&sample_config(2), deps()).map_err(|e| e.to_string()) })
    });
    cache.seed("demo-agent", "demo-user", 1, graph, rebuild, None).await;

    let lease = cache.acquire("demo-agent").await.expect("entry just seeded");
    println!("acquired cfg_version={}", lease.cfg_version());
    drop(lease);

    cache.invalidate("demo-agent", 2).await.expect("rebuild succeeds");
    println!("after invalidate, cfg_version={:?}", cache.cfg_version("demo-agent"));
}
