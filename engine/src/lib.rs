//! Agent graph execution engine: a compiled six-node state graph (§4.1) that runs a
//! single LLM-driven agent turn — plan, act, verify, update, orchestrate memory — with
//! checkpointing, long-term memory, per-tool execution constraints, and a runtime cache
//! of compiled graphs shared across tenants.
//!
//! ## Modules
//!
//! | Module             | Purpose                                                           |
//! |---------------------|--------------------------------------------------------------------|
//! | [`graph`]           | `StateGraph`/`CompiledStateGraph`, `Node`, router (§4.1)          |
//! | [`nodes`]           | The six graph nodes plus `build_graph` (§4.2-§4.6)                |
//! | [`state`]           | `GraphState` and everything threaded through the graph            |
//! | [`config`]          | `AgentConfig` and its nested config types                          |
//! | [`message`]         | `Message`, `Role`, tool call requests                              |
//! | [`constraints`]     | Per-tool execution constraints (§4.6)                              |
//! | [`memory`]          | Checkpointing (`Checkpointer`/`MemorySaver`) and `Store` (§4.5)    |
//! | [`llm`]             | `LlmClient` trait and `MockLlm`                                    |
//! | [`tool_source`]     | `ToolSource` trait for tool listing/invocation                     |
//! | [`tools`]           | Built-in tools (`CalculatorTool`, `EndTaskTool`) and `Tool` trait  |
//! | [`channels`]        | State update channels (`EphemeralValue`, `StateUpdater`)           |
//! | [`stream`]          | Internal streaming event types (`StreamEvent`, `StreamWriter`)     |
//! | [`runtime_cache`]   | `RuntimeCache`: ref-counted, TTL'd, cfg-version-aware cache (§4.7) |
//! | [`dispatcher`]      | `Dispatcher`: transport-agnostic request entry point (§4.8)       |
//! | [`agent_directory`] | `AgentDirectory` trait: agent config + conversation storage        |
//! | [`runner_common`]   | Shared stream-consumption glue used by the dispatcher              |
//! | [`error`]           | `AgentError`, the crate's single error type                        |

pub mod agent_directory;
pub mod channels;
pub mod config;
pub mod constraints;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod message;
pub mod nodes;
pub mod runner_common;
pub mod runtime_cache;
pub mod state;
pub mod stream;
pub mod tool_source;
pub mod tools;

pub use agent_directory::{AgentDirectory, AgentDirectoryError, InMemoryAgentDirectory};
pub use channels::{
    BoxedStateUpdater, Channel, ChannelError, EphemeralValue, FieldBasedUpdater, ReplaceUpdater,
    StateUpdater,
};
pub use config::{
    AgentConfig, AgentMode, ConfigValidationError, ExecutionMode, GraphConfig, MemoryConfig,
    RagConfig, RetryConfig,
};
pub use constraints::{ConstraintViolation, ConstraintsState, ExecutionConstraints, ToolRule};
pub use dispatcher::{DepsFactory, Dispatcher, ExecuteRequest, StateSummary};
pub use error::AgentError;
pub use graph::{
    route, CancelToken, CompilationError, CompiledStateGraph, ConditionalRouter,
    ConditionalRouterFn, NameNode, Next, NextEntry, Node, NodeMiddleware, RetryPolicy, RunContext,
    Runtime, StateGraph, END, START,
};
pub use llm::{LlmClient, LlmResponse, LlmUsage, MockLlm, ToolCallDelta, ToolChoiceMode};
pub use memory::{
    Checkpoint, CheckpointError, CheckpointListItem, CheckpointMetadata, CheckpointSource,
    Checkpointer, Embedder, FilterOp, InMemoryStore, InMemoryVectorStore, Item,
    ListNamespacesOptions, MatchCondition, MemorySaver, Namespace, NamespaceMatchType,
    RunnableConfig, SearchItem, SearchOptions, Store, StoreError, StoreOp, StoreOpResult,
    StoreSearchHit,
};
pub use message::{Message, Role, ToolCallRequest};
pub use nodes::{
    build_graph, AgentExecutorNode, EndGraphNode, GraphDeps, MemoryOrchestratorNode,
    PlanningOrchestratorNode, StartNode, TaskUpdaterNode, TaskVerifierNode,
};
pub use runtime_cache::{CacheEntry, CacheError, CacheLease, RebuildFn, RebuildFuture, RuntimeCache};
pub use state::{
    ErrorKind, GraphState, Memories, NodeId, ShortTermMemory, SimilarityHit, SkipValidation,
    StateError, Step, Task, TaskStatus, ToolSpec as StateToolSpec,
};
pub use stream::{StreamEvent, StreamMode, StreamWriter};
pub use tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};
pub use tools::{CalculatorTool, EndTaskTool, StaticToolSource, Tool};
