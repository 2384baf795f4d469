//! Conditional routing: after a source node runs, a pure function picks the next node id.

use std::collections::HashMap;
use std::sync::Arc;

/// A routing function: state in, next-node key out (looked up in an optional `path_map`).
pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// One source node's conditional routing: the function plus an optional key→node-id map.
pub struct ConditionalRouter<S> {
    pub path: ConditionalRouterFn<S>,
    pub path_map: Option<HashMap<String, String>>,
}

impl<S> ConditionalRouter<S> {
    pub fn new(path: ConditionalRouterFn<S>, path_map: Option<HashMap<String, String>>) -> Self {
        Self { path, path_map }
    }

    /// Resolves the next node id for `state`: calls `path`, then looks the result up in
    /// `path_map` if present (falling back to the raw key when the map has no entry).
    pub fn resolve(&self, state: &S) -> String {
        let key = (self.path)(state);
        match &self.path_map {
            Some(map) => map.get(&key).cloned().unwrap_or(key),
            None => key,
        }
    }
}

impl<S> Clone for ConditionalRouter<S> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            path_map: self.path_map.clone(),
        }
    }
}

/// One entry in the compiled next-node map: either a fixed edge or a conditional router.
pub enum NextEntry<S> {
    Unconditional(String),
    Conditional(ConditionalRouter<S>),
}

impl<S> Clone for NextEntry<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Unconditional(s) => Self::Unconditional(s.clone()),
            Self::Conditional(r) => Self::Conditional(r.clone()),
        }
    }
}
