//! Step outcomes and the decision journal.

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// What a role handler decided for its bound task this tick.
///
/// The outer step consumes it:
/// - `Continue` keeps the binding (phase changes happen inside the handler).
/// - `Finished` completes the task.
/// - `Abandon` releases it so another unit can take it later.
/// - `Failed` drives the task to `Failed`; it is purged at the end of the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Finished,
    Abandon { reason: String },
    Failed { reason: String },
}

impl StepOutcome {
    pub fn abandon(reason: impl Into<String>) -> Self {
        StepOutcome::Abandon {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::Failed {
            reason: reason.into(),
        }
    }
}

/// A decision taken about a task.
///
/// Records what triggered it, which policy applied and what was done, so
/// "why did this task go back to Pending" can be answered after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub task_id: TaskId,

    /// Tick the decision was taken on.
    pub tick: u64,

    /// What was observed. Examples: `{"unit": "miner-3", "reason": "target missing"}`.
    pub trigger: serde_json::Value,

    /// Examples: "unit_release", "invalid_task", "no_destination".
    pub policy: String,

    /// Examples: "release", "fail", "reset", "complete", "finish_cycle".
    pub decision: String,

    pub context: Option<serde_json::Value>,
}

impl DecisionRecord {
    pub fn new(
        task_id: TaskId,
        tick: u64,
        trigger: serde_json::Value,
        policy: impl Into<String>,
        decision: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            tick,
            trigger,
            policy: policy.into(),
            decision: decision.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}
