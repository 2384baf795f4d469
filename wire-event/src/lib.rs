//! Wire protocol for graph run events: payload + envelope + metadata.
//!
//! This crate defines the external wire shape of a single streamed event. It has no
//! dependency on `engine`; the engine crate bridges its internal `StreamEvent<S>` into
//! [`ProtocolEvent`] and calls [`to_json`] to produce the final object a caller of the
//! Request Dispatcher observes.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, RunMetadata};
pub use event::{ErrorWire, ProtocolEvent, TokensWire, ToolCallWire};
