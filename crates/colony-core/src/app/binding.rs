//! Unit task binding: the per-unit façade over the store.
//!
//! Rejections are swallowed here: callers only learn whether the unit holds
//! a task, which is all a role behavior needs.

use crate::app::matcher::Matcher;
use crate::domain::{DecisionRecord, TaskId, Unit};
use crate::ports::World;
use crate::store::TaskStore;

pub fn has_task(unit: &Unit) -> bool {
    unit.bound_task.is_some()
}

/// Bind `unit` to `task`. False if the store rejects it or the unit already holds a task.
pub fn acquire(store: &mut TaskStore, unit: &mut Unit, task: TaskId) -> bool {
    if has_task(unit) {
        return false;
    }
    match store.bind(task, &unit.id, unit.role) {
        Ok(()) => {
            unit.bound_task = Some(task);
            true
        }
        Err(rejection) => {
            tracing::debug!(task = %task, unit = %unit.id, %rejection, "bind rejected");
            false
        }
    }
}

/// Try the matcher's candidates in order until one binds.
///
/// Candidates whose target no longer resolves in `world` are skipped, and a
/// rejected bind (capacity conflict) falls through to the next candidate.
pub fn acquire_best(
    store: &mut TaskStore,
    matcher: &dyn Matcher,
    world: &dyn World,
    unit: &mut Unit,
) -> Option<TaskId> {
    let candidates = matcher.candidates(store, unit.role, unit.scope.as_ref());
    for task in candidates {
        let reachable = store
            .get(task)
            .is_some_and(|t| world.resolve(&t.target).is_some());
        if reachable && acquire(store, unit, task) {
            return Some(task);
        }
    }
    None
}

/// Give the task back. The task returns to Pending once nobody holds it.
pub fn release(store: &mut TaskStore, unit: &mut Unit, reason: &str) {
    if let Some(task) = unit.bound_task
        && store.release(task, &unit.id).is_ok()
    {
        let tick = store.tick();
        store.record_decision(DecisionRecord::new(
            task,
            tick,
            serde_json::json!({ "unit": unit.id, "reason": reason }),
            "unit_release",
            "release",
        ));
    }
    unit.clear_binding();
}

/// Complete the task and end this unit's binding.
///
/// The binding ends even for perpetual tasks: the task restarts, the unit
/// goes back through matching.
pub fn complete(store: &mut TaskStore, unit: &mut Unit) {
    if let Some(task) = unit.bound_task
        && let Err(err) = store.complete(task)
    {
        tracing::debug!(unit = %unit.id, %err, "complete rejected");
    }
    unit.clear_binding();
}

/// Drive the task to Failed and end this unit's binding.
pub fn fail(store: &mut TaskStore, unit: &mut Unit, reason: &str) {
    if let Some(task) = unit.bound_task
        && let Err(err) = store.fail(task, reason)
    {
        tracing::debug!(unit = %unit.id, %err, "fail on missing task");
    }
    unit.clear_binding();
}

pub fn report_progress(store: &mut TaskStore, unit: &Unit, value: u32) -> bool {
    match unit.bound_task {
        Some(task) => store.update_progress(task, value).is_ok(),
        None => false,
    }
}

/// Clear a stale binding.
///
/// Stale means the task is gone, no longer live, or no longer lists this
/// unit (a co-worker completed a group task). Returns whether the unit still
/// holds a valid task.
pub fn check_binding(store: &TaskStore, unit: &mut Unit) -> bool {
    let Some(id) = unit.bound_task else {
        return false;
    };
    let valid = store
        .get(id)
        .is_some_and(|t| t.state.is_live() && t.assignees.contains(&unit.id));
    if !valid {
        tracing::debug!(task = %id, unit = %unit.id, "stale binding cleared");
        unit.clear_binding();
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::matcher::TwoTierMatcher;
    use crate::domain::{ExecutionPhase, Priority, Role, TaskDescriptor, TaskKind, TransferPhase};
    use crate::impls::GridWorld;
    use crate::store::TaskState;

    fn mine(store: &mut TaskStore) -> TaskId {
        store.create_task(
            TaskDescriptor::new(TaskKind::MineSource, "src-1", Priority::High)
                .roles([Role::Miner])
                .perpetual(),
        )
    }

    #[test]
    fn acquire_sets_binding() {
        let mut store = TaskStore::in_memory();
        let id = mine(&mut store);
        let mut unit = Unit::new("m1", Role::Miner);

        assert!(acquire(&mut store, &mut unit, id));
        assert!(has_task(&unit));
        assert_eq!(store.get(id).unwrap().state, TaskState::InProgress);

        // already bound
        assert!(!acquire(&mut store, &mut unit, id));
    }

    #[test]
    fn acquire_rejected_leaves_unit_idle() {
        let mut store = TaskStore::in_memory();
        let id = mine(&mut store);
        let mut courier = Unit::new("c1", Role::Courier);

        assert!(!acquire(&mut store, &mut courier, id));
        assert!(!has_task(&courier));
    }

    #[test]
    fn acquire_best_binds_first_candidate() {
        let mut world = GridWorld::new("W1N1");
        world.add_source("src-1", (3, 3), 3000);
        let mut store = TaskStore::in_memory();
        let id = mine(&mut store);
        let mut unit = Unit::new("m1", Role::Miner);

        assert_eq!(acquire_best(&mut store, &TwoTierMatcher, &world, &mut unit), Some(id));
        let mut second = Unit::new("m2", Role::Miner);
        assert_eq!(acquire_best(&mut store, &TwoTierMatcher, &world, &mut second), None);
    }

    #[test]
    fn acquire_best_passes_over_tasks_with_a_missing_target() {
        let mut world = GridWorld::new("W1N1");
        world.add_site("site-ok", (4, 4), 100);
        let mut store = TaskStore::in_memory();
        let gone = store.create_task(
            TaskDescriptor::new(TaskKind::Build, "site-gone", Priority::High).roles([Role::Builder]),
        );
        let ok = store.create_task(
            TaskDescriptor::new(TaskKind::Build, "site-ok", Priority::Low).roles([Role::Builder]),
        );
        let mut unit = Unit::new("builder-1", Role::Builder);

        assert_eq!(acquire_best(&mut store, &TwoTierMatcher, &world, &mut unit), Some(ok));
        assert_eq!(store.get(gone).unwrap().state, TaskState::Pending);
    }

    #[test]
    fn complete_clears_binding_even_for_perpetual_tasks() {
        let mut store = TaskStore::in_memory();
        let id = mine(&mut store);
        let mut unit = Unit::new("m1", Role::Miner);
        acquire(&mut store, &mut unit, id);
        unit.phase = ExecutionPhase::Transfer(TransferPhase::SeekSource);

        complete(&mut store, &mut unit);

        assert!(!has_task(&unit));
        assert_eq!(unit.phase, ExecutionPhase::Idle);
        assert_eq!(store.get(id).unwrap().state, TaskState::Pending);
    }

    #[test]
    fn release_records_reason() {
        let mut store = TaskStore::in_memory();
        let id = mine(&mut store);
        let mut unit = Unit::new("m1", Role::Miner);
        acquire(&mut store, &mut unit, id);

        release(&mut store, &mut unit, "target missing");

        assert!(!has_task(&unit));
        let last = store.decisions().last().unwrap();
        assert_eq!(last.decision, "release");
        assert_eq!(last.trigger["reason"], "target missing");
    }

    #[test]
    fn stale_binding_is_cleared() {
        let mut store = TaskStore::in_memory();
        let id = mine(&mut store);
        let mut unit = Unit::new("m1", Role::Miner);
        acquire(&mut store, &mut unit, id);
        assert!(check_binding(&store, &mut unit));

        // someone else completed the task behind this unit's back
        store.complete(id).unwrap();

        assert!(!check_binding(&store, &mut unit));
        assert!(!has_task(&unit));
    }

    #[test]
    fn report_progress_without_task_is_false() {
        let mut store = TaskStore::in_memory();
        let unit = Unit::new("m1", Role::Miner);
        assert!(!report_progress(&mut store, &unit, 3));
    }
}
