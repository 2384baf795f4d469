//! # Memory: Checkpointing and Long-term Store
//!
//! [`Checkpointer`] + [`Store`] for persistence.
//!
//! ## Overview
//!
//! The memory module provides two distinct capabilities:
//!
//! 1. **Checkpointer** — Per-thread state snapshots for resumable runs. Keys checkpoints by
//!    `(thread_id, checkpoint_ns, checkpoint_id)`.
//! 2. **Store** — Cross-session key-value storage for long-term memory (preferences, facts,
//!    retrievable context). Isolated by [`Namespace`] (e.g. `[user_id, "memories"]`). Optional
//!    vector search via [`InMemoryVectorStore`].
//!
//! ## Config
//!
//! [`RunnableConfig`] is passed to `CompiledStateGraph::invoke`. When using a checkpointer:
//! - `thread_id`: Required. Identifies the conversation/thread.
//! - `checkpoint_id`: Optional. Load a specific checkpoint.
//! - `checkpoint_ns`: Optional namespace for subgraphs.
//! - `user_id`: Used by Store for multi-tenant isolation.
//!
//! ## Implementations
//!
//! | Checkpointer    | Persistence | Use case       |
//! |-----------------|-------------|----------------|
//! | [`MemorySaver`]  | In-memory   | Dev, tests     |
//!
//! | Store                   | Persistence | Search                       |
//! |--------------------------|-------------|------------------------------|
//! | [`InMemoryStore`]        | In-memory   | String filter (key/value)    |
//! | [`InMemoryVectorStore`]  | In-memory   | Vector similarity (semantic) |

mod checkpoint;
mod checkpointer;
mod config;
mod embedder;
mod in_memory_store;
mod memory_saver;
mod store;
mod vector_store;

pub use checkpoint::{Checkpoint, CheckpointListItem, CheckpointMetadata, CheckpointSource};
pub use checkpointer::{CheckpointError, Checkpointer};
pub use config::RunnableConfig;
pub use embedder::Embedder;
pub use in_memory_store::InMemoryStore;
pub use memory_saver::MemorySaver;
pub use store::{
    FilterOp, Item, ListNamespacesOptions, MatchCondition, Namespace, NamespaceMatchType,
    SearchItem, SearchOptions, Store, StoreError, StoreOp, StoreOpResult, StoreSearchHit,
};
pub use vector_store::InMemoryVectorStore;
