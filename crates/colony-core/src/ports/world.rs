//! World port - シミュレーション世界への窓口
//!
//! Colony は世界を所有しない。クエリ（最寄り探索、距離判定）と
//! アクション（move / harvest / ...）だけをこの trait 越しに使う。
//!
//! # 設計原則
//! - object safe（`&mut dyn World` で渡す）
//! - アクションは固定の小さな語彙 `ActionOutcome` を返す
//! - 未知の結果は「何もせず次 tick で再試行」として扱う（呼び出し側の責務）

use serde::{Deserialize, Serialize};

use crate::domain::{BodyPart, EntityId, Scope, UnitId};

/// What kind of thing an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Source,
    Pile,
    Container,
    Storage,
    Spawn,
    Extension,
    Controller,
    ConstructionSite,
    Road,
    Wall,
    Rampart,
    Unit,
}

/// Read-only view of an entity, as resolved this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: EntityKind,
    pub scope: Option<Scope>,
    pub energy: u32,
    pub energy_capacity: u32,
    pub progress: u32,
    pub progress_total: u32,
    pub hits: u32,
    pub hits_max: u32,
    /// Owned by this colony.
    pub my: bool,
    /// Spawning (units) or producing (facilities).
    pub busy: bool,
    /// Units only.
    pub body: Vec<BodyPart>,
}

impl EntityView {
    pub fn new(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            scope: None,
            energy: 0,
            energy_capacity: 0,
            progress: 0,
            progress_total: 0,
            hits: 0,
            hits_max: 0,
            my: false,
            busy: false,
            body: Vec::new(),
        }
    }

    pub fn has_energy(&self) -> bool {
        self.energy > 0
    }

    pub fn is_full(&self) -> bool {
        self.energy >= self.energy_capacity
    }

    pub fn needs_energy(&self) -> bool {
        self.energy < self.energy_capacity
    }

    pub fn has_part(&self, part: BodyPart) -> bool {
        self.body.contains(&part)
    }

    pub fn is_damaged(&self) -> bool {
        self.hits < self.hits_max
    }

    pub fn is_built(&self) -> bool {
        self.progress >= self.progress_total
    }
}

/// Result of a world action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Ok,
    NotInRange,
    /// Actor or target has nothing to give (empty carry, depleted source, no energy to produce).
    NoResource,
    Full,
    InvalidTarget,
    Busy,
    NameExists,
    /// Anything else the world reports.
    Other(i32),
}

pub type EntityFilter<'a> = &'a dyn Fn(&EntityView) -> bool;

/// World は Colony が消費する外部コラボレータ
pub trait World {
    /// `None` if the entity no longer exists.
    fn resolve(&self, id: &EntityId) -> Option<EntityView>;

    fn find_nearest(&self, origin: &EntityId, filter: EntityFilter<'_>) -> Option<EntityId>;

    /// Matching entities within `range` of `origin`, nearest first.
    fn find_in_range(&self, origin: &EntityId, range: u32, filter: EntityFilter<'_>)
    -> Vec<EntityId>;

    fn entities(&self, filter: EntityFilter<'_>) -> Vec<EntityView>;

    fn range_between(&self, a: &EntityId, b: &EntityId) -> Option<u32>;

    fn in_range(&self, a: &EntityId, b: &EntityId, range: u32) -> bool {
        self.range_between(a, b).is_some_and(|r| r <= range)
    }

    fn move_to(&mut self, unit: &UnitId, target: &EntityId) -> ActionOutcome;
    fn harvest(&mut self, unit: &UnitId, source: &EntityId) -> ActionOutcome;
    fn build(&mut self, unit: &UnitId, site: &EntityId) -> ActionOutcome;
    fn repair(&mut self, unit: &UnitId, structure: &EntityId) -> ActionOutcome;
    fn upgrade(&mut self, unit: &UnitId, controller: &EntityId) -> ActionOutcome;
    fn transfer(&mut self, unit: &UnitId, target: &EntityId) -> ActionOutcome;
    fn withdraw(&mut self, unit: &UnitId, target: &EntityId) -> ActionOutcome;
    fn pickup(&mut self, unit: &UnitId, pile: &EntityId) -> ActionOutcome;

    /// Pull `cargo` (adjacent to `taxi`) one step toward `destination`; the taxi follows.
    fn tow(&mut self, taxi: &UnitId, cargo: &UnitId, destination: &EntityId) -> ActionOutcome;

    /// Start producing a unit named `name` at `facility`.
    fn produce(&mut self, facility: &EntityId, body: &[BodyPart], name: &str) -> ActionOutcome;
}
