//! Channels: per-field merge strategies for state updates.
//!
//! A `Channel<T>` reads, writes, and merges updates into one slice of state. Most
//! `GraphState` fields are plain struct fields updated by whole-state replacement (the
//! teacher's "state-in, state-out" design), but `skip_validation` needs a channel's
//! read-once semantics — `EphemeralValue` backs it.

mod ephemeral_value;
mod error;
mod updater;

pub use ephemeral_value::EphemeralValue;
pub use error::ChannelError;
pub use updater::{BoxedStateUpdater, FieldBasedUpdater, ReplaceUpdater, StateUpdater};

/// A named slice of state with explicit read/write/merge semantics.
pub trait Channel<T>: Send + Sync {
    /// Current value, if any has been written.
    fn read(&self) -> Option<T>;

    /// Overwrites the stored value.
    fn write(&mut self, value: T);

    /// Merges a batch of concurrent updates (last write wins, by default).
    fn update(&mut self, updates: Vec<T>) -> Result<(), ChannelError>;

    /// Name used in diagnostics / visualization.
    fn channel_type(&self) -> &'static str;
}
