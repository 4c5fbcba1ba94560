//! Errors raised by the store and the colony.
//!
//! Nothing here is fatal to the colony: callers handle each variant locally
//! (retry next tick, pick another task, or fail the task).

use super::ids::TaskId;
use super::task::Role;
use crate::store::TaskState;

/// Why the store refused a bind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindRejection {
    #[error("task not found")]
    TaskNotFound,

    #[error("task is not open (state: {state:?})")]
    NotOpen { state: TaskState },

    #[error("task is full (capacity: {capacity})")]
    CapacityFull { capacity: u32 },

    #[error("role {role} is not eligible")]
    RoleIneligible { role: Role },

    #[error("unit is already assigned to a task")]
    AlreadyAssigned,
}

#[derive(Debug, thiserror::Error)]
pub enum ColonyError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task {task} is already {state:?}")]
    NotLive { task: TaskId, state: TaskState },

    #[error("invalid task data for {task}: {reason}")]
    InvalidTaskData { task: TaskId, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
