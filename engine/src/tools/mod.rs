//! Built-in `Tool` implementations.
//!
//! These are demonstrative tools an executor can offer an LLM: `calculator` for arithmetic
//! and `end_task` for signaling task completion (§4.3, §4.6). Deployments can supply richer
//! tool sets by implementing `Tool` (or `ToolSource` directly) without touching the graph.

mod calculator;
mod end_task;
mod r#trait;
mod static_source;

pub use calculator::CalculatorTool;
pub use end_task::EndTaskTool;
pub use r#trait::Tool;
pub use static_source::StaticToolSource;
