//! RoomScanner - デフォルトの Discovery 実装
//!
//! 自分の spawn がある scope ごとに世界を見て、タスク候補を毎回すべて返す。
//! 重複は intake 側で落とす。

use std::collections::BTreeSet;

use crate::domain::{BodyPart, Priority, Role, Scope, TaskDescriptor, TaskKind};
use crate::ports::{Discovery, EntityKind, EntityView, World};
use crate::store::TaskStore;

const HARVEST_RANGE: u32 = 1;
const BUILD_CAPACITY: u32 = 2;
const UPGRADE_CAPACITY: u32 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoomScanner;

impl RoomScanner {
    fn owned_scopes(world: &dyn World) -> BTreeSet<Scope> {
        world
            .entities(&|e: &EntityView| e.my && e.kind == EntityKind::Spawn)
            .into_iter()
            .filter_map(|e| e.scope)
            .collect()
    }

    fn scan_scope(world: &dyn World, store: &TaskStore, scope: &Scope) -> Vec<TaskDescriptor> {
        let in_scope = |e: &EntityView| e.scope.as_ref() == Some(scope);
        let mut found = Vec::new();

        for e in world.entities(&in_scope) {
            let task = match e.kind {
                EntityKind::Source => {
                    if needs_taxi(world, store, &e) {
                        found.push(
                            TaskDescriptor::new(TaskKind::DeliverProducerUnit, e.id.clone(), Priority::High)
                                .roles([Role::Taxi, Role::Generalist]),
                        );
                    }
                    TaskDescriptor::new(TaskKind::MineSource, e.id, Priority::High)
                        .roles([Role::Miner, Role::Generalist])
                        .perpetual()
                }
                EntityKind::ConstructionSite if e.my && !e.is_built() => {
                    TaskDescriptor::new(TaskKind::Build, e.id, Priority::Medium)
                        .roles([Role::Builder, Role::Repairer, Role::Generalist])
                        .capacity(BUILD_CAPACITY)
                }
                EntityKind::Road | EntityKind::Container if e.is_damaged() => {
                    TaskDescriptor::new(TaskKind::Repair, e.id, Priority::Medium)
                        .roles([Role::Repairer, Role::Generalist])
                }
                EntityKind::Wall | EntityKind::Rampart if e.is_damaged() => {
                    TaskDescriptor::new(TaskKind::Repair, e.id, Priority::Low)
                        .roles([Role::Repairer, Role::Generalist])
                }
                EntityKind::Controller if e.my => {
                    TaskDescriptor::new(TaskKind::Upgrade, e.id, Priority::Medium)
                        .roles([Role::Upgrader, Role::Generalist])
                        .perpetual()
                        .capacity(UPGRADE_CAPACITY)
                }
                EntityKind::Pile if e.has_energy() => {
                    TaskDescriptor::new(TaskKind::CollectFromPile, e.id, Priority::Medium)
                        .roles([Role::Courier, Role::Generalist])
                }
                EntityKind::Storage if e.my => {
                    TaskDescriptor::new(TaskKind::Transport, e.id, Priority::Low)
                        .roles([Role::Courier, Role::Generalist])
                        .perpetual()
                }
                _ => continue,
            };
            found.push(task);
        }

        found
            .into_iter()
            .map(|d| d.in_scope(scope.clone()))
            .collect()
    }
}

/// The miner mining `source` cannot walk and is not there yet.
fn needs_taxi(world: &dyn World, store: &TaskStore, source: &EntityView) -> bool {
    let Some(mine) = store.find_live(TaskKind::MineSource, &source.id) else {
        return false;
    };
    mine.assignees.iter().any(|unit| {
        world
            .resolve(unit)
            .is_some_and(|v| !v.busy && !v.has_part(BodyPart::Move))
            && !world.in_range(unit, &source.id, HARVEST_RANGE)
    })
}

impl Discovery for RoomScanner {
    fn discover(&self, world: &dyn World, store: &TaskStore) -> Vec<TaskDescriptor> {
        Self::owned_scopes(world)
            .iter()
            .flat_map(|scope| Self::scan_scope(world, store, scope))
            .collect()
    }
}
