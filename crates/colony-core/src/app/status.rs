//! Status - ステータスクエリ
//!
//! 「ユニットが遊んでいる理由」を外から見えるようにするための集計ビュー。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Role, UnitId};

/// Tasks per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

/// Point-in-time view of the colony.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyStatus {
    pub tick: u64,
    pub tasks: TaskCounts,
    pub units_by_role: BTreeMap<Role, usize>,
    /// Units holding no task.
    pub idle_units: Vec<UnitId>,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub reaped: Vec<UnitId>,
    pub tasks_created: usize,
    pub validation: ValidationReport,
    pub produced: Vec<UnitId>,
    pub finished: usize,
    pub abandoned: usize,
    pub failed: usize,
    pub idle: usize,
    pub purged: usize,
    pub swept: usize,
    /// Store counts after the tick.
    pub tasks: TaskCounts,
}

/// Result of one validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub failed: usize,
    pub completed: usize,
}
