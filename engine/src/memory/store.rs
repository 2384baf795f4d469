//! Store trait and StoreError for cross-thread memory.
//!
//! Aligns with the BaseStore pattern (namespace, put, get, list, search). Distinct from
//! [`crate::memory::Checkpointer`], which is per-thread run state; a `Store` is namespace-isolated
//! and cross-thread, used by the memory orchestrator for long-term retrieval (`GraphState.memories.ltm`).
//!
//! ## Core Types
//!
//! - [`Store`]: The main trait for persistent key-value stores.
//! - [`Item`]: Stored key-value pairs with metadata (namespace, key, value, timestamps).
//! - [`SearchItem`]: Search result with optional relevance score.
//! - [`StoreOp`]: Operations for batch execution (Get, Put, Search, ListNamespaces).
//!
//! ## Example
//!
//! ```rust,ignore
//! use engine::memory::{Store, Namespace};
//!
//! store.put(&namespace, "key1", &json!({"data": "value"})).await?;
//! let item = store.get(&namespace, "key1").await?;
//! ```

use async_trait::async_trait;
use std::time::SystemTime;

/// Namespace for Store: e.g. `[user_id, "memories"]` or `[user_id, "preferences"]`.
///
/// Each element is one level in the hierarchy, allowing nested categorization.
///
/// ```rust
/// use engine::memory::Namespace;
///
/// let ns: Namespace = vec!["users".into(), "user123".into(), "memories".into()];
/// ```
pub type Namespace = Vec<String>;

/// Error for store operations.
///
/// Callers do not depend on underlying backend errors; messages are opaque to avoid
/// leaking backend types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("not found")]
    NotFound,
    #[error("embedding: {0}")]
    EmbeddingError(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// A stored item with metadata.
///
/// Returned by [`Store::get_item`] and [`Store::batch`] (for `Get`); stored via
/// [`Store::put`] and [`Store::batch`] (for `Put`).
#[derive(Debug, Clone)]
pub struct Item {
    pub value: serde_json::Value,
    pub key: String,
    pub namespace: Namespace,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Item {
    pub fn new(namespace: Namespace, key: String, value: serde_json::Value) -> Self {
        let now = SystemTime::now();
        Self {
            value,
            key,
            namespace,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_timestamps(
        namespace: Namespace,
        key: String,
        value: serde_json::Value,
        created_at: SystemTime,
        updated_at: SystemTime,
    ) -> Self {
        Self {
            value,
            key,
            namespace,
            created_at,
            updated_at,
        }
    }
}

/// An [`Item`] plus an optional relevance/similarity score from a ranked search.
#[derive(Debug, Clone)]
pub struct SearchItem {
    pub item: Item,
    pub score: Option<f64>,
}

impl SearchItem {
    pub fn from_item(item: Item) -> Self {
        Self { item, score: None }
    }

    pub fn with_score(item: Item, score: f64) -> Self {
        Self {
            item,
            score: Some(score),
        }
    }
}

/// Filter operators for search.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(serde_json::Value),
    Ne(serde_json::Value),
    Gt(serde_json::Value),
    Gte(serde_json::Value),
    Lt(serde_json::Value),
    Lte(serde_json::Value),
}

/// Options for [`Store::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub filter: Option<std::collections::HashMap<String, FilterOp>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            query: None,
            filter: None,
            limit: 10,
            offset: 0,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Match type for namespace filtering in [`Store::list_namespaces`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceMatchType {
    Prefix,
    Suffix,
}

/// A namespace-matching condition; `path` entries of `"*"` are wildcards.
#[derive(Debug, Clone)]
pub struct MatchCondition {
    pub match_type: NamespaceMatchType,
    pub path: Vec<String>,
}

impl MatchCondition {
    pub fn prefix(path: Vec<String>) -> Self {
        Self {
            match_type: NamespaceMatchType::Prefix,
            path,
        }
    }

    pub fn suffix(path: Vec<String>) -> Self {
        Self {
            match_type: NamespaceMatchType::Suffix,
            path,
        }
    }
}

/// Options for [`Store::list_namespaces`].
#[derive(Debug, Clone, Default)]
pub struct ListNamespacesOptions {
    pub match_conditions: Vec<MatchCondition>,
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
}

impl ListNamespacesOptions {
    pub fn new() -> Self {
        Self {
            match_conditions: Vec::new(),
            max_depth: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_prefix(mut self, prefix: Vec<String>) -> Self {
        self.match_conditions.push(MatchCondition::prefix(prefix));
        self
    }

    pub fn with_suffix(mut self, suffix: Vec<String>) -> Self {
        self.match_conditions.push(MatchCondition::suffix(suffix));
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// One operation in a [`Store::batch`] call.
#[derive(Debug, Clone)]
pub enum StoreOp {
    Get {
        namespace: Namespace,
        key: String,
    },
    Put {
        namespace: Namespace,
        key: String,
        value: Option<serde_json::Value>,
    },
    Search {
        namespace_prefix: Namespace,
        options: SearchOptions,
    },
    ListNamespaces {
        options: ListNamespacesOptions,
    },
}

/// Result of one [`StoreOp`], in the same order as the request.
#[derive(Debug, Clone)]
pub enum StoreOpResult {
    Get(Option<Item>),
    Put,
    Search(Vec<SearchItem>),
    ListNamespaces(Vec<Namespace>),
}

/// A single hit returned by [`Store::search_simple`].
///
/// For key-value or string-filter search (e.g. [`crate::memory::InMemoryStore`]), `score` is
/// `None`. For semantic/vector search (e.g. [`crate::memory::InMemoryVectorStore`]), `score` is
/// the similarity.
#[derive(Debug, Clone)]
pub struct StoreSearchHit {
    pub key: String,
    pub value: serde_json::Value,
    pub score: Option<f64>,
}

/// Long-term cross-session store: namespace-isolated key-value with optional search.
///
/// Used by the memory orchestrator for user preferences and retrievable facts, namespaced by
/// `[user_id, "memories"]` (§4.5). Not tied to a single thread — see [`crate::memory::Checkpointer`]
/// for per-thread run state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Stores `value` under `namespace` and `key`, replacing any existing value.
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Returns the value for `(namespace, key)`, or `None` if not found.
    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Returns the full [`Item`] for `(namespace, key)`, or `None` if not found.
    async fn get_item(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError>;

    /// Deletes the item at `(namespace, key)`. Idempotent.
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    /// Returns all keys in the given namespace (order is implementation-defined).
    async fn list(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError>;

    /// Searches within the namespace prefix with the given options.
    async fn search(
        &self,
        namespace_prefix: &Namespace,
        options: SearchOptions,
    ) -> Result<Vec<SearchItem>, StoreError>;

    /// Lists namespaces matching the given options.
    async fn list_namespaces(
        &self,
        options: ListNamespacesOptions,
    ) -> Result<Vec<Namespace>, StoreError>;

    /// Executes multiple operations in a single batch; result order matches request order.
    async fn batch(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreOpResult>, StoreError>;

    /// Searches within the namespace (legacy API; prefer [`search`](Store::search)).
    async fn search_simple(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreSearchHit>, StoreError> {
        let options = SearchOptions {
            query: query.map(String::from),
            filter: None,
            limit: limit.unwrap_or(10),
            offset: 0,
        };
        let results = self.search(namespace, options).await?;
        Ok(results
            .into_iter()
            .map(|si| StoreSearchHit {
                key: si.item.key,
                value: si.item.value,
                score: si.score,
            })
            .collect())
    }
}
