//! The task-relevant facet of a unit.

use serde::{Deserialize, Serialize};

use super::ids::{EntityId, TaskId, UnitId};
use super::task::{Role, Scope};

/// A unit as the colony sees it.
///
/// Design:
/// - `bound_task` is a weak reference (by id) into the store. Deleting a task
///   never touches units; a stale binding is detected when the unit next steps.
/// - `phase` is owned exclusively by the unit and persists across ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub role: Role,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub bound_task: Option<TaskId>,
    #[serde(default)]
    pub phase: ExecutionPhase,
}

impl Unit {
    pub fn new(id: impl Into<UnitId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            scope: None,
            bound_task: None,
            phase: ExecutionPhase::Idle,
        }
    }

    pub fn in_scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Drop the binding and any role-specific sub-state.
    pub fn clear_binding(&mut self) {
        self.bound_task = None;
        self.phase = ExecutionPhase::Idle;
    }
}

/// Role-specific execution sub-state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPhase {
    #[default]
    Idle,
    Transfer(TransferPhase),
    Taxi(TaxiPhase),
    Work(WorkPhase),
}

/// Collect energy, then deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPhase {
    SeekSource,
    Collecting {
        source: EntityId,
        method: CollectMethod,
    },
    SeekDestination,
    Delivering {
        destination: EntityId,
        method: DeliverMethod,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectMethod {
    Pickup,
    Withdraw,
    Harvest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliverMethod {
    Transfer,
    Upgrade,
}

/// Relocate an immobile unit to its work site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxiPhase {
    SeekCargo,
    Approach { cargo: UnitId },
    Towing { cargo: UnitId },
}

/// Build / repair / upgrade with a refill sub-routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkPhase {
    Working,
    Refilling { from: Option<EntityId> },
}
