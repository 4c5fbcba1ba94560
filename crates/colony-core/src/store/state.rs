//! Task state machine for the store.

use serde::{Deserialize, Serialize};

/// Task state.
///
/// State transitions:
/// - Pending -> InProgress (first assignee binds)
/// - InProgress -> Pending (last assignee releases, or a perpetual task completes)
/// - InProgress -> Completed (non-perpetual task completes)
/// - any live state -> Failed (target permanently invalid, or invalid task data)
///
/// Design note: `state == InProgress` iff the task has assignees. The record
/// keeps that in sync, nothing else writes `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for a unit.
    Pending,

    /// At least one unit is bound.
    InProgress,

    /// Done; removed by the next sweep.
    Completed,

    /// Given up; purged at the end of the tick.
    Failed,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Can units still bind or keep working on it?
    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }
}
