//! Producer dispatch - 生産施設ごとに「次に何を作るか」を決める
//!
//! 1 tick に 1 回、生産中でない自分の spawn ごとに:
//! 1. その施設宛ての SpawnUnit 注文があれば最優先で処理
//! 2. ブートストラップ（generalist / miner / courier が 0 体）なら generalist
//! 3. それ以外は需要（未着手タスク数 - 人口）が最大の role
//!
//! 生産に成功したユニットは `Unit` として返し、Colony が名簿に登録する。

pub mod body;

use std::cmp::Reverse;
use std::collections::BTreeMap;

pub use self::body::{build_body, is_viable};

use crate::domain::{
    BodyPart, ColonyConfig, EntityId, Role, Scope, SpawnOrder, TaskKind, Unit, UnitId,
};
use crate::ports::{ActionOutcome, EntityKind, EntityView, World};
use crate::store::{TaskRecord, TaskState, TaskStore};

/// Tie-break order between equally needed roles, highest first.
const ROLE_PRIORITY: [Role; 6] = [
    Role::Upgrader,
    Role::Builder,
    Role::Repairer,
    Role::Miner,
    Role::Courier,
    Role::Taxi,
];

/// Roles whose absence triggers bootstrap production.
const BOOTSTRAP_ROLES: [Role; 3] = [Role::Generalist, Role::Miner, Role::Courier];

/// Result of one production attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Production {
    Started(UnitId),
    /// Facility busy: try again next tick.
    Deferred,
    /// Given up for this tick.
    Abandoned(ActionOutcome),
}

/// Per-facility production, driven by the colony config (soft caps, part costs, body length).
#[derive(Debug, Clone)]
pub struct ProducerDispatch {
    config: ColonyConfig,
}

impl ProducerDispatch {
    pub fn from_config(config: &ColonyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn body_for(&self, role: Role, budget: u32) -> Vec<BodyPart> {
        build_body(role, budget, &self.config.part_costs, self.config.max_body_parts)
    }

    /// Run every idle facility once. Returns the units whose production started.
    pub fn run(
        &self,
        store: &mut TaskStore,
        world: &mut dyn World,
        units: &BTreeMap<UnitId, Unit>,
    ) -> Vec<Unit> {
        let facilities = world.entities(&|e: &EntityView| e.my && e.kind == EntityKind::Spawn);
        let mut produced: Vec<Unit> = Vec::new();

        for facility in facilities {
            if facility.busy {
                continue;
            }
            let scope = facility.scope.clone();
            let population = population(units.values().chain(produced.iter()), scope.as_ref());
            if let Some(unit) = self.run_facility(store, world, &facility, &population) {
                produced.push(unit);
            }
        }
        produced
    }

    fn run_facility(
        &self,
        store: &mut TaskStore,
        world: &mut dyn World,
        facility: &EntityView,
        population: &BTreeMap<Role, u32>,
    ) -> Option<Unit> {
        let scope = facility.scope.as_ref();
        let budget = energy_available(&*world, scope);

        if let Some(order) = pending_order(store, &facility.id) {
            return self.serve_order(store, world, facility, order, budget);
        }

        let selected = if needs_bootstrap(store, scope, population) {
            Some(Role::Generalist).filter(|role| self.affordable(*role, budget))
        } else {
            self.select_unit_type(store, scope, population, budget)
        };
        let role = selected?;

        let body = self.body_for(role, budget);
        match issue_production(world, &facility.id, role, &body, store.tick()) {
            Production::Started(name) => Some(registered(name, role, scope)),
            _ => None,
        }
    }

    /// A production order queued as a `SpawnUnit` task.
    fn serve_order(
        &self,
        store: &mut TaskStore,
        world: &mut dyn World,
        facility: &EntityView,
        task: TaskRecord,
        budget: u32,
    ) -> Option<Unit> {
        let order = match decode_order(&task) {
            Ok(order) => order,
            Err(reason) => {
                tracing::warn!(task = %task.id, reason = %reason, "invalid production order");
                if let Err(err) = store.fail(task.id, reason) {
                    tracing::debug!(task = %task.id, %err, "order vanished");
                }
                return None;
            }
        };

        let cost = self.config.part_costs.body_cost(&order.body);
        if cost > budget {
            tracing::debug!(task = %task.id, cost, budget, "order waits for energy");
            return None;
        }

        match issue_production(world, &facility.id, order.role, &order.body, store.tick()) {
            Production::Started(name) => {
                if let Err(err) = store.complete(task.id) {
                    tracing::debug!(task = %task.id, %err, "order vanished");
                }
                Some(registered(name, order.role, facility.scope.as_ref()))
            }
            _ => None,
        }
    }

    /// Role with the largest unmet need in `scope`, if one is affordable.
    ///
    /// A role is a candidate when its population is under the soft cap and
    /// open tasks for it exist. Need = open tasks - population; ties go to
    /// the earlier role in the priority order. Generalists are only produced
    /// by bootstrap.
    pub fn select_unit_type(
        &self,
        store: &TaskStore,
        scope: Option<&Scope>,
        population: &BTreeMap<Role, u32>,
        budget: u32,
    ) -> Option<Role> {
        let outstanding = outstanding(store, scope);

        let (_, role) = ROLE_PRIORITY
            .iter()
            .enumerate()
            .filter_map(|(rank, role)| {
                let living = population.get(role).copied().unwrap_or(0);
                let open = outstanding.get(role).copied().unwrap_or(0);
                if living >= self.config.soft_cap(*role) || open == 0 {
                    return None;
                }
                let need = i64::from(open) - i64::from(living);
                Some(((need, Reverse(rank)), *role))
            })
            .max_by_key(|(key, _)| *key)?;

        self.affordable(role, budget).then_some(role)
    }

    fn affordable(&self, role: Role, budget: u32) -> bool {
        is_viable(role, &self.body_for(role, budget))
    }
}

fn registered(name: UnitId, role: Role, scope: Option<&Scope>) -> Unit {
    let mut unit = Unit::new(name, role);
    unit.scope = scope.cloned();
    unit
}

/// Ask the world to produce. One retry with a random suffix on a name collision.
pub fn issue_production(
    world: &mut dyn World,
    facility: &EntityId,
    role: Role,
    body: &[BodyPart],
    tick: u64,
) -> Production {
    let name = format!("{role}-{tick}");
    let outcome = match world.produce(facility, body, &name) {
        ActionOutcome::NameExists => {
            let retry = format!("{name}-{:04x}", rand::random::<u16>());
            tracing::debug!(facility = %facility, name = %retry, "name taken, retrying");
            return match world.produce(facility, body, &retry) {
                ActionOutcome::Ok => started(facility, role, body, retry),
                other => abandoned(facility, role, other),
            };
        }
        other => other,
    };
    match outcome {
        ActionOutcome::Ok => started(facility, role, body, name),
        ActionOutcome::Busy => Production::Deferred,
        other => abandoned(facility, role, other),
    }
}

fn started(facility: &EntityId, role: Role, body: &[BodyPart], name: String) -> Production {
    tracing::info!(facility = %facility, role = %role, unit = %name, parts = body.len(), "production started");
    Production::Started(UnitId::new(name))
}

fn abandoned(facility: &EntityId, role: Role, outcome: ActionOutcome) -> Production {
    tracing::info!(facility = %facility, role = %role, outcome = ?outcome, "production abandoned");
    Production::Abandoned(outcome)
}

/// First pending `SpawnUnit` order for `facility`, in listing order.
fn pending_order(store: &TaskStore, facility: &EntityId) -> Option<TaskRecord> {
    store
        .tasks()
        .filter(|t| {
            t.kind == TaskKind::SpawnUnit && &t.target == facility && t.state == TaskState::Pending
        })
        .min_by_key(|t| (Reverse(t.priority), t.created_at, t.seq))
        .cloned()
}

fn decode_order(task: &TaskRecord) -> Result<SpawnOrder, String> {
    let order: SpawnOrder = serde_json::from_value(task.payload.clone())
        .map_err(|e| format!("bad production order: {e}"))?;
    if order.body.is_empty() {
        return Err("production order has an empty body".to_string());
    }
    Ok(order)
}

fn in_scope(task: &TaskRecord, scope: Option<&Scope>) -> bool {
    task.scope.is_none() || task.scope.as_ref() == scope
}

/// Units per role in `scope`.
pub fn population<'a>(
    units: impl Iterator<Item = &'a Unit>,
    scope: Option<&Scope>,
) -> BTreeMap<Role, u32> {
    let mut counts = BTreeMap::new();
    for unit in units.filter(|u| u.scope.as_ref() == scope) {
        *counts.entry(unit.role).or_insert(0) += 1;
    }
    counts
}

/// Open tasks per eligible role in `scope`.
fn outstanding(store: &TaskStore, scope: Option<&Scope>) -> BTreeMap<Role, u32> {
    let mut counts = BTreeMap::new();
    for task in store
        .tasks()
        .filter(|t| t.kind != TaskKind::SpawnUnit && t.is_open() && in_scope(t, scope))
    {
        for role in &task.eligible_roles {
            *counts.entry(*role).or_insert(0) += 1;
        }
    }
    counts
}

fn needs_bootstrap(store: &TaskStore, scope: Option<&Scope>, population: &BTreeMap<Role, u32>) -> bool {
    let nobody = BOOTSTRAP_ROLES
        .iter()
        .all(|role| population.get(role).copied().unwrap_or(0) == 0);
    nobody
        && store
            .tasks()
            .any(|t| t.kind != TaskKind::SpawnUnit && t.is_open() && in_scope(t, scope))
}

/// Energy the facilities of `scope` can spend right now.
fn energy_available(world: &dyn World, scope: Option<&Scope>) -> u32 {
    world
        .entities(&|e: &EntityView| {
            e.my
                && matches!(e.kind, EntityKind::Spawn | EntityKind::Extension)
                && e.scope.as_ref() == scope
        })
        .iter()
        .map(|e| e.energy)
        .sum()
}
