//! Task vocabulary: kinds, priorities, roles, scopes and the descriptors
//! discovery hands to the store.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::body::BodyPart;
use super::ids::EntityId;

/// What a task asks a unit to do with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    MineSource,
    DeliverProducerUnit,
    CollectFromPile,
    Build,
    Repair,
    Upgrade,
    Transport,
    SpawnUnit,
    Defend,
}

impl TaskKind {
    /// Long-running work gets the larger default progress limit.
    pub fn is_long_running(self) -> bool {
        matches!(
            self,
            TaskKind::MineSource | TaskKind::Build | TaskKind::Repair | TaskKind::Upgrade
        )
    }

    /// At most one live task per `(kind, target)` for these kinds.
    ///
    /// Production orders target a facility and may queue up.
    pub fn is_target_scoped(self) -> bool {
        !matches!(self, TaskKind::SpawnUnit)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Task priority. Ordered so that `High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Capability profile of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Miner,
    Taxi,
    Courier,
    Builder,
    Repairer,
    Upgrader,
    Generalist,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Miner,
        Role::Taxi,
        Role::Courier,
        Role::Builder,
        Role::Repairer,
        Role::Upgrader,
        Role::Generalist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Miner => "miner",
            Role::Taxi => "taxi",
            Role::Courier => "courier",
            Role::Builder => "builder",
            Role::Repairer => "repairer",
            Role::Upgrader => "upgrader",
            Role::Generalist => "generalist",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locality constraint (a room name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything needed to create a task.
///
/// Produced by discovery (or by a component that needs work done) and turned
/// into a `TaskRecord` by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    pub target: EntityId,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub priority: Priority,
    pub eligible_roles: BTreeSet<Role>,
    #[serde(default)]
    pub perpetual: bool,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_capacity() -> u32 {
    1
}

impl TaskDescriptor {
    pub fn new(kind: TaskKind, target: impl Into<EntityId>, priority: Priority) -> Self {
        Self {
            kind,
            target: target.into(),
            scope: None,
            priority,
            eligible_roles: BTreeSet::new(),
            perpetual: false,
            capacity: default_capacity(),
            payload: serde_json::Value::Null,
        }
    }

    /// A production order for `facility`.
    pub fn spawn_order(facility: impl Into<EntityId>, order: &SpawnOrder) -> Self {
        Self {
            payload: serde_json::to_value(order).unwrap_or_default(),
            ..Self::new(TaskKind::SpawnUnit, facility, Priority::High)
        }
    }

    pub fn in_scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.eligible_roles.extend(roles);
        self
    }

    pub fn perpetual(mut self) -> Self {
        self.perpetual = true;
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Payload of a `SpawnUnit` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOrder {
    pub role: Role,
    pub body: Vec<BodyPart>,
}
