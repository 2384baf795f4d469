//! Execution constraints: per-tool rules the executor checks before a tool call runs (§4.6).
//!
//! Rules are keyed by tool name; a tool with no entry has no restrictions beyond the
//! defaults baked into [`ConstraintsState::check`] (none). `end_task` and
//! `mobile_use_device` carry spec-mandated defaults out of the box.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// One tool's rule set.
#[derive(Clone, Debug, Default)]
pub struct ToolRule {
    pub prevent_consecutive_duplicates: bool,
    pub max_retries: Option<u32>,
    pub required_precedents: Vec<String>,
    pub blocked_after: Vec<String>,
}

/// Static per-agent constraint configuration: a rule table keyed by tool name.
///
/// Carries the spec's two named defaults (`end_task`, `mobile_use_device`) plus whatever
/// a deployment adds via [`ExecutionConstraints::with_rule`].
#[derive(Clone, Debug)]
pub struct ExecutionConstraints {
    rules: HashMap<String, ToolRule>,
    history_cap: usize,
}

impl Default for ExecutionConstraints {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            "end_task".to_string(),
            ToolRule {
                prevent_consecutive_duplicates: false,
                max_retries: Some(1),
                required_precedents: Vec::new(),
                blocked_after: vec!["end_task".to_string()],
            },
        );
        rules.insert(
            "mobile_use_device".to_string(),
            ToolRule {
                prevent_consecutive_duplicates: false,
                max_retries: None,
                required_precedents: vec!["mobile_list_available_devices".to_string()],
                blocked_after: Vec::new(),
            },
        );
        Self {
            rules,
            history_cap: 10,
        }
    }
}

impl ExecutionConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tool's rule.
    pub fn with_rule(mut self, tool: impl Into<String>, rule: ToolRule) -> Self {
        self.rules.insert(tool.into(), rule);
        self
    }
}

/// Why a tool call was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintViolation {
    ConsecutiveDuplicate,
    MaxRetriesExceeded { max: u32 },
    MissingPrecedent { required: String },
    BlockedByHistory { blocker: String },
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsecutiveDuplicate => write!(f, "tool called twice in a row"),
            Self::MaxRetriesExceeded { max } => write!(f, "tool already called {max} time(s) in recent history"),
            Self::MissingPrecedent { required } => write!(f, "requires \"{required}\" to have run first"),
            Self::BlockedByHistory { blocker } => write!(f, "blocked because \"{blocker}\" already ran"),
        }
    }
}

/// Per-run mutable constraint bookkeeping: tool history, last tool, completion attempts.
///
/// One `ConstraintsState` per task (or per run); the executor consults [`Self::check`]
/// before every tool call and calls [`Self::record`] after an accepted call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConstraintsState {
    #[serde(default)]
    tool_history: VecDeque<String>,
    #[serde(default)]
    last_tool: Option<String>,
    #[serde(default)]
    pub step_in_progress: bool,
    #[serde(default)]
    pub completion_attempts: u32,
}

impl ConstraintsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(())` if `tool` may be called now, or the first violated rule.
    pub fn check(&self, constraints: &ExecutionConstraints, tool: &str) -> Result<(), ConstraintViolation> {
        let rule = match constraints.rules.get(tool) {
            Some(r) => r,
            None => return Ok(()),
        };

        if rule.prevent_consecutive_duplicates && self.last_tool.as_deref() == Some(tool) {
            return Err(ConstraintViolation::ConsecutiveDuplicate);
        }

        if let Some(max) = rule.max_retries {
            let recent = self.tool_history.iter().rev().take(3).filter(|t| t.as_str() == tool).count() as u32;
            if recent >= max {
                return Err(ConstraintViolation::MaxRetriesExceeded { max });
            }
        }

        for required in &rule.required_precedents {
            if !self.tool_history.iter().any(|t| t == required) {
                return Err(ConstraintViolation::MissingPrecedent {
                    required: required.clone(),
                });
            }
        }

        for blocker in &rule.blocked_after {
            if self.tool_history.iter().any(|t| t == blocker) {
                return Err(ConstraintViolation::BlockedByHistory {
                    blocker: blocker.clone(),
                });
            }
        }

        Ok(())
    }

    /// Records an accepted call: pushes `tool` into history (capped, FIFO), updates
    /// `last_tool`, and increments `completion_attempts` when `tool == "end_task"`.
    pub fn record(&mut self, constraints: &ExecutionConstraints, tool: &str) {
        self.tool_history.push_back(tool.to_string());
        while self.tool_history.len() > constraints.history_cap {
            self.tool_history.pop_front();
        }
        self.last_tool = Some(tool.to_string());
        if tool == "end_task" {
            self.completion_attempts += 1;
        }
    }
}
