//! Common stream execution glue shared by the dispatcher: run the compiled graph to
//! completion and load-or-build the initial state around a checkpointer.
//!
//! - [`run_stream_with_config`]: build initial state → compiled.stream → consume events → return final state.
//! - [`load_from_checkpoint_or_build`]: try load from checkpointer, else run `build_fresh` future; merge user message when loaded.

use std::collections::HashSet;
use std::future::Future;

use tokio_stream::StreamExt;

use crate::graph::{CancelToken, CompiledStateGraph};
use crate::memory::{CheckpointError, Checkpointer, RunnableConfig};
use crate::stream::{StreamEvent, StreamMode};

/// Tries to load state from checkpointer; if found, merges `user_message` via `merge` and returns.
/// Otherwise runs `build_fresh` and returns its result.
pub async fn load_from_checkpoint_or_build<S, F, M>(
    checkpointer: Option<&dyn Checkpointer<S>>,
    runnable_config: Option<&RunnableConfig>,
    user_message: &str,
    build_fresh: F,
    merge: M,
) -> Result<S, CheckpointError>
where
    F: Future<Output = Result<S, CheckpointError>>,
    M: FnOnce(S, String) -> S,
    S: Clone + Send + Sync + 'static,
{
    let load_from_checkpoint =
        checkpointer.is_some() && runnable_config.and_then(|c| c.thread_id.as_ref()).is_some();

    if load_from_checkpoint {
        let cp = checkpointer.expect("checkpointer is Some");
        let config = runnable_config.expect("runnable_config is Some");
        let tuple = cp.get_tuple(config).await?;
        if let Some((checkpoint, _)) = tuple {
            return Ok(merge(checkpoint.state, user_message.to_string()));
        }
    }

    build_fresh.await
}

/// Error when the stream ends without producing a final `Values` state.
#[derive(Debug, thiserror::Error)]
#[error("stream ended without final state")]
pub struct StreamEndedWithoutState;

/// Runs the compiled graph in streaming mode, consuming events and returning the final state.
///
/// Uses fixed stream modes (Messages, Tasks, Updates, Values, Custom). When `on_event`
/// is provided, invokes it for each `StreamEvent`. Returns the state from the last
/// `StreamEvent::Values` in the stream.
pub async fn run_stream_with_config<S, F>(
    compiled: &CompiledStateGraph<S>,
    initial_state: S,
    run_config: Option<RunnableConfig>,
    on_event: Option<F>,
) -> Result<S, StreamEndedWithoutState>
where
    S: Clone + Send + Sync + std::fmt::Debug + 'static,
    F: FnMut(StreamEvent<S>),
{
    run_stream_with_cancel(compiled, initial_state, run_config, on_event, CancelToken::new()).await
}

/// Same as [`run_stream_with_config`], but runs under a caller-supplied `CancelToken` so the
/// dispatcher can cancel an in-flight run from outside the consuming loop.
pub async fn run_stream_with_cancel<S, F>(
    compiled: &CompiledStateGraph<S>,
    initial_state: S,
    run_config: Option<RunnableConfig>,
    mut on_event: Option<F>,
    cancel: CancelToken,
) -> Result<S, StreamEndedWithoutState>
where
    S: Clone + Send + Sync + std::fmt::Debug + 'static,
    F: FnMut(StreamEvent<S>),
{
    let modes = HashSet::from([
        StreamMode::Messages,
        StreamMode::Tasks,
        StreamMode::Tools,
        StreamMode::Updates,
        StreamMode::Values,
        StreamMode::Custom,
        StreamMode::Checkpoints,
    ]);
    let mut stream = compiled.stream_with_cancel(initial_state, run_config, modes, cancel);
    let mut final_state: Option<S> = None;
    while let Some(event) = stream.next().await {
        if let Some(ref mut f) = on_event {
            f(event.clone());
        }
        if let StreamEvent::Values(s) = event {
            final_state = Some(s);
        }
    }
    final_state.ok_or(StreamEndedWithoutState)
}
