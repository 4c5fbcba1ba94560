//! Colony - tick ドライバ
//!
//! 1 tick の流れ:
//! 1. tick を進める
//! 2. 死んだユニットを名簿から外す（タスクは release）
//! 3. discovery → intake（scan_period ごと）
//! 4. タスク検証（validate_period ごと）
//! 5. 生産施設ごとの producer dispatch
//! 6. ユニットを id 順に 1 体ずつ step
//! 7. Failed を purge、sweep_period ごとに Completed を sweep
//!
//! ユニットは逐次に処理されるので、同じ tick でも先に bind した方が枠を取る。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::behavior::{self, StepContext, UnitStep};
use super::binding;
use super::intake;
use super::matcher::Matcher;
use super::producer::ProducerDispatch;
use super::status::{ColonyStatus, TickReport};
use super::validate;
use crate::domain::{
    ColonyConfig, ColonyError, DecisionRecord, StepOutcome, TaskDescriptor, TaskId, Unit, UnitId,
};
use crate::ports::{Discovery, World};
use crate::store::{StoreSnapshot, SweepPolicy, TaskStore};

/// Everything needed to resume a colony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonySnapshot {
    pub tick: u64,
    pub store: StoreSnapshot,
    pub units: Vec<Unit>,
}

impl ColonySnapshot {
    pub fn to_json(&self) -> Result<String, ColonyError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, ColonyError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// The colony: task store, unit roster and the components run each tick.
///
/// Built with [`ColonyBuilder`](super::builder::ColonyBuilder).
pub struct Colony {
    pub(crate) config: ColonyConfig,
    pub(crate) store: TaskStore,
    pub(crate) units: BTreeMap<UnitId, Unit>,
    pub(crate) discovery: Box<dyn Discovery>,
    pub(crate) matcher: Box<dyn Matcher>,
    pub(crate) producer: ProducerDispatch,
    pub(crate) policy: SweepPolicy,
    pub(crate) tick: u64,
}

impl Colony {
    pub fn tick(&mut self, world: &mut dyn World) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        self.store.set_tick(tick);
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        report.reaped = self.reap(&*world);

        if self.policy.should_scan(tick) {
            let found = self.discovery.discover(&*world, &self.store);
            report.tasks_created = intake::ingest(&mut self.store, found);
        }

        if self.policy.should_validate(tick) {
            report.validation = validate::validate_tasks(&mut self.store, &*world);
        }

        for unit in self.producer.run(&mut self.store, &mut *world, &self.units) {
            report.produced.push(unit.id.clone());
            self.units.insert(unit.id.clone(), unit);
        }

        self.step_units(world, &mut report);

        report.purged = self.store.purge_failed();
        if self.policy.should_sweep(tick) {
            report.swept = self.store.sweep_completed();
        }
        report.tasks = self.store.counts();

        tracing::debug!(
            tick,
            created = report.tasks_created,
            produced = report.produced.len(),
            finished = report.finished,
            idle = report.idle,
            "tick done"
        );
        report
    }

    /// Drop units whose entity is gone and release what they held.
    fn reap(&mut self, world: &dyn World) -> Vec<UnitId> {
        let dead: Vec<UnitId> = self
            .units
            .keys()
            .filter(|id| world.resolve(id).is_none())
            .cloned()
            .collect();
        for id in &dead {
            if let Some(mut unit) = self.units.remove(id) {
                tracing::info!(unit = %id, role = %unit.role, "unit reaped");
                binding::release(&mut self.store, &mut unit, "unit died");
            }
        }
        dead
    }

    fn step_units(&mut self, world: &mut dyn World, report: &mut TickReport) {
        let mut ctx = StepContext {
            store: &mut self.store,
            world,
            matcher: self.matcher.as_ref(),
        };
        for unit in self.units.values_mut() {
            if let Some(scope) = ctx.world.resolve(&unit.id).and_then(|v| v.scope) {
                unit.scope = Some(scope);
            }
            match behavior::step(unit, &mut ctx) {
                UnitStep::Spawning => {}
                UnitStep::Idle => report.idle += 1,
                UnitStep::Acted(StepOutcome::Continue) => {}
                UnitStep::Acted(StepOutcome::Finished) => report.finished += 1,
                UnitStep::Acted(StepOutcome::Abandon { .. }) => report.abandoned += 1,
                UnitStep::Acted(StepOutcome::Failed { .. }) => report.failed += 1,
            }
        }
    }

    /// Add a unit to the roster (one that already exists in the world).
    pub fn add_unit(&mut self, unit: Unit) {
        self.units.insert(unit.id.clone(), unit);
    }

    /// Submit work directly, bypassing discovery. Deduplicated like discovery.
    pub fn submit(&mut self, descriptor: TaskDescriptor) -> Option<TaskId> {
        self.store.create_unique(descriptor)
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &ColonyConfig {
        &self.config
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.store.decisions()
    }

    pub fn status(&self) -> ColonyStatus {
        let mut units_by_role = BTreeMap::new();
        let mut idle_units = Vec::new();
        for unit in self.units.values() {
            *units_by_role.entry(unit.role).or_insert(0) += 1;
            if !binding::has_task(unit) {
                idle_units.push(unit.id.clone());
            }
        }
        ColonyStatus {
            tick: self.tick,
            tasks: self.store.counts(),
            units_by_role,
            idle_units,
        }
    }

    pub fn snapshot(&self) -> ColonySnapshot {
        ColonySnapshot {
            tick: self.tick,
            store: self.store.snapshot(),
            units: self.units.values().cloned().collect(),
        }
    }

    /// Replace tasks, units and the tick counter with the snapshot's.
    pub fn restore(&mut self, snapshot: ColonySnapshot) {
        self.tick = snapshot.tick;
        self.store.restore(snapshot.store);
        self.store.set_tick(snapshot.tick);
        self.units = snapshot
            .units
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
    }
}

impl std::fmt::Debug for Colony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Colony")
            .field("tick", &self.tick)
            .field("tasks", &self.store.len())
            .field("units", &self.units.len())
            .finish()
    }
}
