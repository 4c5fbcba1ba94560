//! Periodic task validation against the world.
//!
//! Units cannot tell a transient miss from a permanent one, so they only
//! release. This sweep is what fails tasks whose target is gone and completes
//! tasks the world already shows as done.

use super::status::ValidationReport;
use crate::domain::{EntityId, TaskId, TaskKind};
use crate::ports::World;
use crate::store::TaskStore;

enum Verdict {
    Keep,
    Done,
    Gone,
}

fn judge(world: &dyn World, kind: TaskKind, target: &EntityId) -> Verdict {
    let Some(view) = world.resolve(target) else {
        return Verdict::Gone;
    };
    let done = match kind {
        TaskKind::Repair => !view.is_damaged(),
        TaskKind::Build => view.is_built(),
        TaskKind::CollectFromPile => !view.has_energy(),
        _ => false,
    };
    if done { Verdict::Done } else { Verdict::Keep }
}

pub fn validate_tasks(store: &mut TaskStore, world: &dyn World) -> ValidationReport {
    let live: Vec<(TaskId, TaskKind, EntityId)> = store
        .tasks()
        .filter(|t| t.state.is_live())
        .map(|t| (t.id, t.kind, t.target.clone()))
        .collect();

    let mut report = ValidationReport {
        checked: live.len(),
        ..ValidationReport::default()
    };
    for (id, kind, target) in live {
        let result = match judge(world, kind, &target) {
            Verdict::Keep => continue,
            Verdict::Gone => {
                report.failed += 1;
                store.fail(id, format!("target {target} no longer exists"))
            }
            Verdict::Done => {
                report.completed += 1;
                store.complete(id)
            }
        };
        if let Err(err) = result {
            tracing::warn!(task = %id, %err, "validation could not update task");
        }
    }

    tracing::debug!(
        checked = report.checked,
        failed = report.failed,
        completed = report.completed,
        "tasks validated"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Role, TaskDescriptor};
    use crate::impls::GridWorld;
    use crate::ports::EntityKind;
    use crate::store::TaskState;

    fn world() -> GridWorld {
        let mut world = GridWorld::new("W1N1");
        world
            .add_source("src-1", (1, 1), 3000)
            .add_structure("road-1", EntityKind::Road, (2, 2), 5000, 5000)
            .add_structure("wall-1", EntityKind::Wall, (3, 3), 100, 10_000)
            .add_site("site-1", (4, 4), 100)
            .add_pile("pile-1", (5, 5), 0);
        world
    }

    fn create(store: &mut TaskStore, kind: TaskKind, target: &str) -> TaskId {
        store.create_task(TaskDescriptor::new(kind, target, Priority::Medium).roles([Role::Generalist]))
    }

    #[test]
    fn sorts_tasks_into_keep_complete_and_fail() {
        let world = world();
        let mut store = TaskStore::in_memory();
        let mine = create(&mut store, TaskKind::MineSource, "src-1");
        let road = create(&mut store, TaskKind::Repair, "road-1");
        let wall = create(&mut store, TaskKind::Repair, "wall-1");
        let site = create(&mut store, TaskKind::Build, "site-1");
        let pile = create(&mut store, TaskKind::CollectFromPile, "pile-1");
        let gone = create(&mut store, TaskKind::Build, "site-9");

        let report = validate_tasks(&mut store, &world);

        assert_eq!(
            report,
            ValidationReport {
                checked: 6,
                failed: 1,
                completed: 2,
            }
        );
        let state = |id| store.get(id).unwrap().state;
        assert_eq!(state(mine), TaskState::Pending);
        assert_eq!(state(road), TaskState::Completed);
        assert_eq!(state(wall), TaskState::Pending);
        assert_eq!(state(site), TaskState::Pending);
        assert_eq!(state(pile), TaskState::Completed);
        assert_eq!(state(gone), TaskState::Failed);
        assert_eq!(
            store.get(gone).unwrap().last_error.as_deref(),
            Some("target site-9 no longer exists")
        );
    }

    #[test]
    fn terminal_tasks_are_not_checked() {
        let world = world();
        let mut store = TaskStore::in_memory();
        let id = create(&mut store, TaskKind::Build, "site-9");
        store.fail(id, "earlier").unwrap();

        assert_eq!(validate_tasks(&mut store, &world).checked, 0);
    }

    #[test]
    fn perpetual_task_with_live_target_is_left_alone() {
        let mut world = world();
        world.add_controller("ctrl-1", (9, 9));
        let mut store = TaskStore::in_memory();
        let id = store.create_task(
            TaskDescriptor::new(TaskKind::Upgrade, "ctrl-1", Priority::Medium)
                .roles([Role::Upgrader])
                .perpetual(),
        );

        validate_tasks(&mut store, &world);
        assert_eq!(store.get(id).unwrap().state, TaskState::Pending);
    }
}
