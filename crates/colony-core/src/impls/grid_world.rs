//! GridWorld - 開発用・テスト用の World 実装
//!
//! 1 部屋ぶんの格子。距離はチェビシェフ距離、移動は 1 tick に 1 マス。
//! 経路探索はしない（障害物も無い）。アクションの数値は本物のゲームに寄せてある。

use std::collections::BTreeMap;

use crate::domain::{BodyPart, EntityId, PartCosts, Scope, UnitId, count_parts};
use crate::ports::{ActionOutcome, EntityFilter, EntityKind, EntityView, World};

pub type Pos = (i32, i32);

pub const HARVEST_PER_WORK: u32 = 2;
pub const BUILD_PER_WORK: u32 = 5;
pub const REPAIR_PER_WORK: u32 = 100;
pub const UPGRADE_PER_WORK: u32 = 1;
pub const CARRY_CAPACITY: u32 = 50;
pub const SPAWN_TICKS_PER_PART: u32 = 3;
pub const SOURCE_REGEN_TICKS: u64 = 300;
pub const SPAWN_CAPACITY: u32 = 300;
pub const EXTENSION_CAPACITY: u32 = 50;

/// Range of build / repair / upgrade. Everything else needs adjacency.
pub const WORK_RANGE: u32 = 3;
const ADJACENT: u32 = 1;

/// Body part missing for the action.
const ERR_NO_BODYPART: i32 = -12;

#[derive(Debug, Clone)]
struct Entity {
    view: EntityView,
    pos: Pos,
    /// Sources refill to this amount.
    regen_to: u32,
    /// Unit being produced (spawns only).
    spawning: Option<Spawning>,
}

#[derive(Debug, Clone)]
struct Spawning {
    unit: UnitId,
    remaining: u32,
}

/// In-memory single-room world.
#[derive(Debug, Clone)]
pub struct GridWorld {
    scope: Scope,
    entities: BTreeMap<EntityId, Entity>,
    tick: u64,
    part_costs: PartCosts,
}

fn distance(a: Pos, b: Pos) -> u32 {
    (a.0 - b.0).unsigned_abs().max((a.1 - b.1).unsigned_abs())
}

fn step_toward(from: Pos, to: Pos) -> Pos {
    (from.0 + (to.0 - from.0).signum(), from.1 + (to.1 - from.1).signum())
}

impl GridWorld {
    pub fn new(scope: impl Into<Scope>) -> Self {
        Self {
            scope: scope.into(),
            entities: BTreeMap::new(),
            tick: 0,
            part_costs: PartCosts::default(),
        }
    }

    pub fn with_part_costs(mut self, costs: PartCosts) -> Self {
        self.part_costs = costs;
        self
    }

    /// A small room with a bit of everything.
    pub fn demo() -> Self {
        let mut world = Self::new("W1N1");
        world
            .add_spawn("spawn-1", (10, 10), SPAWN_CAPACITY)
            .add_extension("ext-1", (11, 11), 0)
            .add_extension("ext-2", (9, 11), 0)
            .add_source("src-1", (3, 3), 3000)
            .add_source("src-2", (17, 15), 3000)
            .add_controller("ctrl-1", (10, 18))
            .add_storage("storage-1", (12, 10), 0)
            .add_site("site-1", (8, 12), 300)
            .add_structure("road-1", EntityKind::Road, (9, 9), 2000, 5000)
            .add_structure("wall-1", EntityKind::Wall, (0, 10), 9000, 10_000)
            .add_pile("pile-1", (5, 5), 120);
        world
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn position(&self, id: &EntityId) -> Option<Pos> {
        self.entities.get(id).map(|e| e.pos)
    }

    fn insert(&mut self, mut view: EntityView, pos: Pos) -> &mut Self {
        view.scope = Some(self.scope.clone());
        let regen_to = if view.kind == EntityKind::Source {
            view.energy
        } else {
            0
        };
        self.entities.insert(
            view.id.clone(),
            Entity {
                view,
                pos,
                regen_to,
                spawning: None,
            },
        );
        self
    }

    pub fn add_source(&mut self, id: &str, pos: Pos, energy: u32) -> &mut Self {
        let mut v = EntityView::new(id, EntityKind::Source);
        v.energy = energy;
        v.energy_capacity = energy;
        self.insert(v, pos)
    }

    pub fn add_pile(&mut self, id: &str, pos: Pos, energy: u32) -> &mut Self {
        let mut v = EntityView::new(id, EntityKind::Pile);
        v.energy = energy;
        self.insert(v, pos)
    }

    pub fn add_spawn(&mut self, id: &str, pos: Pos, energy: u32) -> &mut Self {
        let v = Self::store_view(id, EntityKind::Spawn, energy, SPAWN_CAPACITY, 5000);
        self.insert(v, pos)
    }

    pub fn add_extension(&mut self, id: &str, pos: Pos, energy: u32) -> &mut Self {
        let v = Self::store_view(id, EntityKind::Extension, energy, EXTENSION_CAPACITY, 1000);
        self.insert(v, pos)
    }

    pub fn add_storage(&mut self, id: &str, pos: Pos, energy: u32) -> &mut Self {
        let v = Self::store_view(id, EntityKind::Storage, energy, 1_000_000, 10_000);
        self.insert(v, pos)
    }

    /// Containers are not owned by anyone.
    pub fn add_container(&mut self, id: &str, pos: Pos, energy: u32) -> &mut Self {
        let mut v = Self::store_view(id, EntityKind::Container, energy, 2000, 250_000);
        v.my = false;
        self.insert(v, pos)
    }

    fn store_view(id: &str, kind: EntityKind, energy: u32, capacity: u32, hits: u32) -> EntityView {
        let mut v = EntityView::new(id, kind);
        v.energy = energy.min(capacity);
        v.energy_capacity = capacity;
        v.hits = hits;
        v.hits_max = hits;
        v.my = true;
        v
    }

    pub fn add_controller(&mut self, id: &str, pos: Pos) -> &mut Self {
        let mut v = EntityView::new(id, EntityKind::Controller);
        v.my = true;
        v.progress_total = 200_000;
        self.insert(v, pos)
    }

    pub fn add_site(&mut self, id: &str, pos: Pos, progress_total: u32) -> &mut Self {
        let mut v = EntityView::new(id, EntityKind::ConstructionSite);
        v.my = true;
        v.progress_total = progress_total;
        self.insert(v, pos)
    }

    pub fn add_structure(
        &mut self,
        id: &str,
        kind: EntityKind,
        pos: Pos,
        hits: u32,
        hits_max: u32,
    ) -> &mut Self {
        let mut v = EntityView::new(id, kind);
        v.hits = hits.min(hits_max);
        v.hits_max = hits_max;
        v.my = !matches!(kind, EntityKind::Road | EntityKind::Wall | EntityKind::Container);
        self.insert(v, pos)
    }

    pub fn add_unit(&mut self, id: &str, pos: Pos, body: &[BodyPart]) -> &mut Self {
        let v = Self::unit_view(EntityId::from(id), body);
        self.insert(v, pos)
    }

    fn unit_view(id: EntityId, body: &[BodyPart]) -> EntityView {
        let mut v = EntityView::new(id, EntityKind::Unit);
        v.my = true;
        v.body = body.to_vec();
        v.energy_capacity = count_parts(body, BodyPart::Carry) as u32 * CARRY_CAPACITY;
        v.hits = 100 * body.len() as u32;
        v.hits_max = v.hits;
        v
    }

    pub fn set_energy(&mut self, id: &str, energy: u32) -> &mut Self {
        if let Some(e) = self.entities.get_mut(&EntityId::from(id)) {
            e.view.energy = energy;
        }
        self
    }

    pub fn set_hits(&mut self, id: &str, hits: u32) -> &mut Self {
        if let Some(e) = self.entities.get_mut(&EntityId::from(id)) {
            e.view.hits = hits.min(e.view.hits_max);
        }
        self
    }

    /// Destroy an entity (a unit dies, a structure is torn down).
    pub fn remove(&mut self, id: &str) -> bool {
        self.entities.remove(&EntityId::from(id)).is_some()
    }

    /// End of tick. Production progresses and finished sites become roads.
    /// Sources refill on their period and empty piles vanish.
    pub fn advance(&mut self) {
        self.tick += 1;

        let mut born = Vec::new();
        for facility in self.entities.values_mut() {
            let done = match facility.spawning.as_mut() {
                Some(s) => {
                    s.remaining = s.remaining.saturating_sub(1);
                    s.remaining == 0
                }
                None => false,
            };
            if done && let Some(s) = facility.spawning.take() {
                facility.view.busy = false;
                born.push(s.unit);
            }
        }
        for unit in born {
            if let Some(e) = self.entities.get_mut(&unit) {
                e.view.busy = false;
            }
        }

        let built: Vec<(EntityId, Pos)> = self
            .entities
            .values()
            .filter(|e| e.view.kind == EntityKind::ConstructionSite && e.view.is_built())
            .map(|e| (e.view.id.clone(), e.pos))
            .collect();
        for (site, pos) in built {
            self.entities.remove(&site);
            let id = format!("road-{}-{}", pos.0, pos.1);
            self.add_structure(&id, EntityKind::Road, pos, 5000, 5000);
        }

        if self.tick % SOURCE_REGEN_TICKS == 0 {
            for e in self.entities.values_mut() {
                if e.view.kind == EntityKind::Source {
                    e.view.energy = e.regen_to;
                }
            }
        }

        self.entities
            .retain(|_, e| e.view.kind != EntityKind::Pile || e.view.energy > 0);
    }

    fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    fn range(&self, a: &EntityId, b: &EntityId) -> Option<u32> {
        Some(distance(self.entity(a)?.pos, self.entity(b)?.pos))
    }

    /// Active (not spawning) unit with the given part, or the outcome to return.
    fn actor(&self, unit: &UnitId, part: BodyPart) -> Result<&Entity, ActionOutcome> {
        let e = self.entity(unit).ok_or(ActionOutcome::InvalidTarget)?;
        if e.view.kind != EntityKind::Unit {
            return Err(ActionOutcome::InvalidTarget);
        }
        if e.view.busy {
            return Err(ActionOutcome::Busy);
        }
        if !e.view.has_part(part) {
            return Err(ActionOutcome::Other(ERR_NO_BODYPART));
        }
        Ok(e)
    }

    /// Shared checks of actions on a target: kind accepted and within range.
    fn target(
        &self,
        actor: &Entity,
        target: &EntityId,
        range: u32,
        accept: impl Fn(&EntityView) -> bool,
    ) -> Result<&Entity, ActionOutcome> {
        let t = self.entity(target).ok_or(ActionOutcome::InvalidTarget)?;
        if !accept(&t.view) {
            return Err(ActionOutcome::InvalidTarget);
        }
        if distance(actor.pos, t.pos) > range {
            return Err(ActionOutcome::NotInRange);
        }
        Ok(t)
    }

    fn add_energy(&mut self, id: &EntityId, delta: i64) {
        if let Some(e) = self.entities.get_mut(id) {
            e.view.energy = (i64::from(e.view.energy) + delta).max(0) as u32;
        }
    }

    fn drop_energy(&mut self, pos: Pos, amount: u32) {
        let existing = self
            .entities
            .values()
            .find(|e| e.view.kind == EntityKind::Pile && e.pos == pos)
            .map(|e| e.view.id.clone());
        match existing {
            Some(id) => self.add_energy(&id, i64::from(amount)),
            None => {
                let id = format!("pile-{}-{}", pos.0, pos.1);
                self.add_pile(&id, pos, amount);
            }
        }
    }

    fn energy_available(&self, scope: Option<&Scope>) -> u32 {
        self.entities
            .values()
            .filter(|e| {
                e.view.my
                    && matches!(e.view.kind, EntityKind::Spawn | EntityKind::Extension)
                    && e.view.scope.as_ref() == scope
            })
            .map(|e| e.view.energy)
            .sum()
    }

    /// Take `cost` from spawns first, then extensions.
    fn drain_energy(&mut self, scope: Option<&Scope>, mut cost: u32) {
        for kind in [EntityKind::Spawn, EntityKind::Extension] {
            for e in self.entities.values_mut() {
                if cost == 0 {
                    return;
                }
                if e.view.kind == kind && e.view.my && e.view.scope.as_ref() == scope {
                    let take = e.view.energy.min(cost);
                    e.view.energy -= take;
                    cost -= take;
                }
            }
        }
    }

    fn act(&mut self, unit: &UnitId, part: BodyPart, f: impl FnOnce(&mut Self, &Entity) -> ActionOutcome) -> ActionOutcome {
        let actor = match self.actor(unit, part) {
            Ok(e) => e.clone(),
            Err(outcome) => return outcome,
        };
        f(self, &actor)
    }
}

impl World for GridWorld {
    fn resolve(&self, id: &EntityId) -> Option<EntityView> {
        self.entity(id).map(|e| e.view.clone())
    }

    fn find_nearest(&self, origin: &EntityId, filter: EntityFilter<'_>) -> Option<EntityId> {
        let from = self.entity(origin)?.pos;
        self.entities
            .values()
            .filter(|e| &e.view.id != origin && filter(&e.view))
            .min_by_key(|e| distance(from, e.pos))
            .map(|e| e.view.id.clone())
    }

    fn find_in_range(
        &self,
        origin: &EntityId,
        range: u32,
        filter: EntityFilter<'_>,
    ) -> Vec<EntityId> {
        let Some(from) = self.entity(origin).map(|e| e.pos) else {
            return Vec::new();
        };
        let mut hits: Vec<(u32, EntityId)> = self
            .entities
            .values()
            .filter(|e| &e.view.id != origin && filter(&e.view))
            .map(|e| (distance(from, e.pos), e.view.id.clone()))
            .filter(|(d, _)| *d <= range)
            .collect();
        hits.sort();
        hits.into_iter().map(|(_, id)| id).collect()
    }

    fn entities(&self, filter: EntityFilter<'_>) -> Vec<EntityView> {
        self.entities
            .values()
            .filter(|e| filter(&e.view))
            .map(|e| e.view.clone())
            .collect()
    }

    fn range_between(&self, a: &EntityId, b: &EntityId) -> Option<u32> {
        self.range(a, b)
    }

    fn move_to(&mut self, unit: &UnitId, target: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Move, |world, actor| {
            let Some(to) = world.position(target) else {
                return ActionOutcome::InvalidTarget;
            };
            if distance(actor.pos, to) > ADJACENT
                && let Some(e) = world.entities.get_mut(unit)
            {
                e.pos = step_toward(actor.pos, to);
            }
            ActionOutcome::Ok
        })
    }

    fn harvest(&mut self, unit: &UnitId, source: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Work, |world, actor| {
            let src = match world.target(actor, source, ADJACENT, |v| v.kind == EntityKind::Source) {
                Ok(t) => t.view.clone(),
                Err(outcome) => return outcome,
            };
            if !src.has_energy() {
                return ActionOutcome::NoResource;
            }
            let work = count_parts(&actor.view.body, BodyPart::Work) as u32;
            let mut amount = (work * HARVEST_PER_WORK).min(src.energy);
            if actor.view.energy_capacity > 0 {
                let free = actor.view.energy_capacity - actor.view.energy.min(actor.view.energy_capacity);
                if free == 0 {
                    return ActionOutcome::Full;
                }
                amount = amount.min(free);
                world.add_energy(unit, i64::from(amount));
            } else {
                world.drop_energy(actor.pos, amount);
            }
            world.add_energy(source, -i64::from(amount));
            ActionOutcome::Ok
        })
    }

    fn build(&mut self, unit: &UnitId, site: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Work, |world, actor| {
            let s = match world.target(actor, site, WORK_RANGE, |v| {
                v.kind == EntityKind::ConstructionSite
            }) {
                Ok(t) => t.view.clone(),
                Err(outcome) => return outcome,
            };
            if !actor.view.has_energy() {
                return ActionOutcome::NoResource;
            }
            if s.is_built() {
                return ActionOutcome::Full;
            }
            let work = count_parts(&actor.view.body, BodyPart::Work) as u32;
            let amount = (work * BUILD_PER_WORK)
                .min(actor.view.energy)
                .min(s.progress_total - s.progress);
            if let Some(e) = world.entities.get_mut(site) {
                e.view.progress += amount;
            }
            world.add_energy(unit, -i64::from(amount));
            ActionOutcome::Ok
        })
    }

    fn repair(&mut self, unit: &UnitId, structure: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Work, |world, actor| {
            let s = match world.target(actor, structure, WORK_RANGE, |v| {
                v.hits_max > 0 && v.kind != EntityKind::Unit
            }) {
                Ok(t) => t.view.clone(),
                Err(outcome) => return outcome,
            };
            if !actor.view.has_energy() {
                return ActionOutcome::NoResource;
            }
            if !s.is_damaged() {
                return ActionOutcome::Full;
            }
            let work = count_parts(&actor.view.body, BodyPart::Work) as u32;
            let mut amount = (work * REPAIR_PER_WORK).min(s.hits_max - s.hits);
            let mut cost = amount.div_ceil(REPAIR_PER_WORK);
            if cost > actor.view.energy {
                cost = actor.view.energy;
                amount = cost * REPAIR_PER_WORK;
            }
            if let Some(e) = world.entities.get_mut(structure) {
                e.view.hits = (e.view.hits + amount).min(e.view.hits_max);
            }
            world.add_energy(unit, -i64::from(cost));
            ActionOutcome::Ok
        })
    }

    fn upgrade(&mut self, unit: &UnitId, controller: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Work, |world, actor| {
            if let Err(outcome) = world.target(actor, controller, WORK_RANGE, |v| {
                v.kind == EntityKind::Controller && v.my
            }) {
                return outcome;
            }
            if !actor.view.has_energy() {
                return ActionOutcome::NoResource;
            }
            let work = count_parts(&actor.view.body, BodyPart::Work) as u32;
            let amount = (work * UPGRADE_PER_WORK).min(actor.view.energy);
            if let Some(e) = world.entities.get_mut(controller) {
                e.view.progress += amount;
            }
            world.add_energy(unit, -i64::from(amount));
            ActionOutcome::Ok
        })
    }

    fn transfer(&mut self, unit: &UnitId, target: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Carry, |world, actor| {
            let t = match world.target(actor, target, ADJACENT, |v| v.energy_capacity > 0) {
                Ok(t) => t.view.clone(),
                Err(outcome) => return outcome,
            };
            if !actor.view.has_energy() {
                return ActionOutcome::NoResource;
            }
            if t.is_full() {
                return ActionOutcome::Full;
            }
            let amount = actor.view.energy.min(t.energy_capacity - t.energy);
            world.add_energy(target, i64::from(amount));
            world.add_energy(unit, -i64::from(amount));
            ActionOutcome::Ok
        })
    }

    fn withdraw(&mut self, unit: &UnitId, target: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Carry, |world, actor| {
            let t = match world.target(actor, target, ADJACENT, |v| {
                matches!(
                    v.kind,
                    EntityKind::Storage
                        | EntityKind::Container
                        | EntityKind::Spawn
                        | EntityKind::Extension
                )
            }) {
                Ok(t) => t.view.clone(),
                Err(outcome) => return outcome,
            };
            if actor.view.is_full() {
                return ActionOutcome::Full;
            }
            if !t.has_energy() {
                return ActionOutcome::NoResource;
            }
            let amount = t.energy.min(actor.view.energy_capacity - actor.view.energy);
            world.add_energy(target, -i64::from(amount));
            world.add_energy(unit, i64::from(amount));
            ActionOutcome::Ok
        })
    }

    fn pickup(&mut self, unit: &UnitId, pile: &EntityId) -> ActionOutcome {
        self.act(unit, BodyPart::Carry, |world, actor| {
            let p = match world.target(actor, pile, ADJACENT, |v| v.kind == EntityKind::Pile) {
                Ok(t) => t.view.clone(),
                Err(outcome) => return outcome,
            };
            if actor.view.is_full() {
                return ActionOutcome::Full;
            }
            let amount = p.energy.min(actor.view.energy_capacity - actor.view.energy);
            world.add_energy(unit, i64::from(amount));
            if amount >= p.energy {
                world.entities.remove(pile);
            } else {
                world.add_energy(pile, -i64::from(amount));
            }
            ActionOutcome::Ok
        })
    }

    fn tow(&mut self, taxi: &UnitId, cargo: &UnitId, destination: &EntityId) -> ActionOutcome {
        self.act(taxi, BodyPart::Move, |world, actor| {
            let c = match world.target(actor, cargo, ADJACENT, |v| v.kind == EntityKind::Unit) {
                Ok(t) => t.pos,
                Err(outcome) => return outcome,
            };
            let Some(to) = world.position(destination) else {
                return ActionOutcome::InvalidTarget;
            };
            if distance(c, to) > ADJACENT {
                if let Some(e) = world.entities.get_mut(cargo) {
                    e.pos = step_toward(c, to);
                }
                if let Some(e) = world.entities.get_mut(taxi) {
                    e.pos = c;
                }
            }
            ActionOutcome::Ok
        })
    }

    fn produce(&mut self, facility: &EntityId, body: &[BodyPart], name: &str) -> ActionOutcome {
        let Some(f) = self.entity(facility) else {
            return ActionOutcome::InvalidTarget;
        };
        if f.view.kind != EntityKind::Spawn || !f.view.my || body.is_empty() {
            return ActionOutcome::InvalidTarget;
        }
        if f.spawning.is_some() {
            return ActionOutcome::Busy;
        }
        let unit = EntityId::from(name);
        if self.entities.contains_key(&unit) {
            return ActionOutcome::NameExists;
        }
        let (pos, scope) = (f.pos, f.view.scope.clone());
        let cost = self.part_costs.body_cost(body);
        if self.energy_available(scope.as_ref()) < cost {
            return ActionOutcome::NoResource;
        }

        self.drain_energy(scope.as_ref(), cost);
        let mut view = Self::unit_view(unit.clone(), body);
        view.busy = true;
        self.insert(view, pos);
        if let Some(f) = self.entities.get_mut(facility) {
            f.view.busy = true;
            f.spawning = Some(Spawning {
                unit,
                remaining: body.len() as u32 * SPAWN_TICKS_PER_PART,
            });
        }
        ActionOutcome::Ok
    }
}
