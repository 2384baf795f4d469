//! Checkpoint and metadata types.
//!
//! A [`Checkpoint`] is a state snapshot plus an id and timestamp, stored by a
//! [`crate::memory::Checkpointer`] keyed by `(thread_id, checkpoint_ns, checkpoint_id)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Monotonically increasing counter used for checkpoint ids. A plain `u64` counter rather than
/// a UUID: checkpoint ordering only needs to be well-defined within a process, and a counter
/// sorts the same way it was created, which keeps `MemorySaver::list` trivial.
static NEXT_CHECKPOINT_ID: AtomicU64 = AtomicU64::new(1);

fn next_checkpoint_id() -> String {
    NEXT_CHECKPOINT_ID.fetch_add(1, Ordering::Relaxed).to_string()
}

/// Source of a checkpoint, carried in [`CheckpointMetadata`] for history / time-travel UIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckpointSource {
    /// Created from an input to invoke/stream.
    #[default]
    Input,
    /// Created from inside the run loop.
    Loop,
    /// Created from a manual state update.
    Update,
    /// Created as a copy of another checkpoint.
    Fork,
}

/// Metadata for a single checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    /// Step number of the checkpoint (-1 for input, 0 for first loop iteration, etc.).
    pub step: i64,
    pub created_at: Option<SystemTime>,
    /// Parent checkpoint ids, keyed by checkpoint_ns.
    pub parents: HashMap<String, String>,
}

/// One checkpoint: a state snapshot plus id/timestamp/metadata.
///
/// Produced by graph execution after each run (§4.1); consumed by
/// [`crate::memory::Checkpointer::put`] and returned by `get_tuple`.
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    pub id: String,
    /// Milliseconds since the Unix epoch, as a string (matches the wire `timestamp` format).
    pub ts: String,
    pub state: S,
    pub metadata: CheckpointMetadata,
}

impl<S> Checkpoint<S> {
    /// Creates a checkpoint from the current state, assigning the next monotonic id.
    pub fn from_state(state: S, source: CheckpointSource, step: i64) -> Self {
        Self::with_id(next_checkpoint_id(), state, source, step)
    }

    /// Creates a checkpoint with a caller-supplied id (e.g. when restoring).
    pub fn with_id(id: String, state: S, source: CheckpointSource, step: i64) -> Self {
        let now = SystemTime::now();
        let ts = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis().to_string())
            .unwrap_or_else(|_| "0".to_string());
        Self {
            id,
            ts,
            state,
            metadata: CheckpointMetadata {
                source,
                step,
                created_at: Some(now),
                parents: HashMap::new(),
            },
        }
    }
}

impl<S: Clone> Checkpoint<S> {
    /// Deep clone, useful when forking a checkpoint.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

impl<S: Default> Default for Checkpoint<S> {
    fn default() -> Self {
        Self::from_state(S::default(), CheckpointSource::Input, -1)
    }
}

/// One entry returned by [`crate::memory::Checkpointer::list`] for history / time-travel.
#[derive(Debug, Clone)]
pub struct CheckpointListItem {
    pub checkpoint_id: String,
    pub metadata: CheckpointMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_source_all_variants() {
        let s = CheckpointSource::Input;
        let _ = format!("{:?}", s);
        let _ = s.clone();
        assert_eq!(CheckpointSource::default(), CheckpointSource::Input);
    }

    #[test]
    fn checkpoint_from_state_gets_a_monotonic_id() {
        let cp1: Checkpoint<i32> = Checkpoint::from_state(1, CheckpointSource::Input, -1);
        let cp2: Checkpoint<i32> = Checkpoint::from_state(2, CheckpointSource::Loop, 0);
        let id1: u64 = cp1.id.parse().unwrap();
        let id2: u64 = cp2.id.parse().unwrap();
        assert!(id2 > id1);
    }

    #[test]
    fn checkpoint_unique_ids() {
        let cp1: Checkpoint<i32> = Checkpoint::from_state(1, CheckpointSource::Input, -1);
        let cp2: Checkpoint<i32> = Checkpoint::from_state(2, CheckpointSource::Loop, 0);
        let cp3: Checkpoint<i32> = Checkpoint::from_state(3, CheckpointSource::Loop, 1);
        assert_ne!(cp1.id, cp2.id);
        assert_ne!(cp2.id, cp3.id);
        assert_ne!(cp1.id, cp3.id);
    }

    #[test]
    fn checkpoint_with_custom_id() {
        let custom_id = "custom-checkpoint-id";
        let checkpoint: Checkpoint<String> = Checkpoint::with_id(
            custom_id.to_string(),
            "state".to_string(),
            CheckpointSource::Fork,
            5,
        );
        assert_eq!(checkpoint.id, custom_id);
        assert_eq!(checkpoint.metadata.step, 5);
    }

    #[test]
    fn checkpoint_copy_creates_deep_clone() {
        let original: Checkpoint<String> =
            Checkpoint::from_state("state".to_string(), CheckpointSource::Loop, 1);
        let copied = original.copy();
        assert_eq!(original.id, copied.id);
        assert_eq!(original.state, copied.state);
    }

    #[test]
    fn checkpoint_default_has_expected_values() {
        let checkpoint: Checkpoint<i32> = Checkpoint::default();
        assert_eq!(checkpoint.state, 0);
        assert_eq!(checkpoint.metadata.source, CheckpointSource::Input);
    }

    #[test]
    fn checkpoint_metadata_default() {
        let metadata = CheckpointMetadata::default();
        assert_eq!(metadata.source, CheckpointSource::Input);
        assert_eq!(metadata.step, 0);
        assert!(metadata.created_at.is_none());
        assert!(metadata.parents.is_empty());
    }
}
