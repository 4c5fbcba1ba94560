//! Task record: descriptor fields + lifecycle state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::TaskState;
use crate::domain::{EntityId, Priority, Role, Scope, TaskDescriptor, TaskId, TaskKind, UnitId};

/// A task in the store.
///
/// Design:
/// - This is the "single source of truth" for task state.
/// - Units hold the `TaskId` only.
/// - All state transitions happen here, each one leaves the invariants intact:
///   `assignees.len() <= capacity`, `InProgress` iff assignees is non-empty,
///   `progress <= progress_limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub kind: TaskKind,
    pub target: EntityId,
    pub scope: Option<Scope>,
    pub eligible_roles: BTreeSet<Role>,
    pub priority: Priority,
    pub state: TaskState,

    pub progress: u32,
    pub progress_limit: u32,

    pub perpetual: bool,
    pub capacity: u32,
    pub assignees: BTreeSet<UnitId>,

    /// Tick of creation.
    pub created_at: u64,

    /// Creation order inside the store, the last tie-breaker of the listing order.
    pub seq: u64,

    pub payload: serde_json::Value,

    /// Why the task failed (diagnostics only).
    pub last_error: Option<String>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        descriptor: TaskDescriptor,
        progress_limit: u32,
        created_at: u64,
        seq: u64,
    ) -> Self {
        Self {
            id,
            kind: descriptor.kind,
            target: descriptor.target,
            scope: descriptor.scope,
            eligible_roles: descriptor.eligible_roles,
            priority: descriptor.priority,
            state: TaskState::Pending,
            progress: 0,
            progress_limit,
            perpetual: descriptor.perpetual,
            capacity: descriptor.capacity.max(1),
            assignees: BTreeSet::new(),
            created_at,
            seq,
            payload: descriptor.payload,
            last_error: None,
        }
    }

    /// Live and not yet full.
    pub fn is_open(&self) -> bool {
        self.state.is_live() && (self.assignees.len() as u32) < self.capacity
    }

    /// Role eligible and scope compatible.
    ///
    /// A task without scope accepts any requester; a scoped task only
    /// requesters in the same scope.
    pub fn accepts(&self, role: Role, scope: Option<&Scope>) -> bool {
        self.eligible_roles.contains(&role)
            && match &self.scope {
                None => true,
                Some(s) => scope == Some(s),
            }
    }

    /// Add an assignee (0 -> 1 moves the task to InProgress).
    pub fn add_assignee(&mut self, unit: UnitId) {
        self.assignees.insert(unit);
        self.state = TaskState::InProgress;
    }

    /// Remove an assignee (1 -> 0 reverts the task to Pending).
    pub fn remove_assignee(&mut self, unit: &UnitId) {
        self.assignees.remove(unit);
        if self.assignees.is_empty() && self.state == TaskState::InProgress {
            self.state = TaskState::Pending;
        }
    }

    /// Back to a freshly created Pending task (perpetual completion).
    pub fn reset(&mut self) {
        self.state = TaskState::Pending;
        self.progress = 0;
        self.assignees.clear();
    }

    pub fn mark_completed(&mut self) {
        self.state = TaskState::Completed;
        self.assignees.clear();
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.state = TaskState::Failed;
        self.assignees.clear();
        self.last_error = Some(reason);
    }

    /// Only while InProgress. Clamped to the limit and never decreasing.
    pub fn set_progress(&mut self, value: u32) {
        if self.state != TaskState::InProgress {
            return;
        }
        self.progress = self.progress.max(value.min(self.progress_limit));
    }
}
