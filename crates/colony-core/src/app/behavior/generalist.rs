//! Generalist: picks the machine by task kind.

use super::{StepContext, taxi, transfer, worker};
use crate::domain::{StepOutcome, TaskKind, Unit};
use crate::store::TaskRecord;

pub fn step(unit: &mut Unit, task: &TaskRecord, ctx: &mut StepContext<'_>) -> StepOutcome {
    match task.kind {
        TaskKind::MineSource | TaskKind::CollectFromPile => {
            transfer::step(unit, task, ctx, Some(&task.target))
        }
        TaskKind::Transport => transfer::step(unit, task, ctx, None),
        TaskKind::Build | TaskKind::Repair | TaskKind::Upgrade => worker::step(unit, task, ctx),
        TaskKind::DeliverProducerUnit => taxi::step(unit, task, ctx),
        TaskKind::Defend | TaskKind::SpawnUnit => {
            StepOutcome::failed(format!("{} cannot be executed by a unit", task.kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::behavior::{StepContext, UnitStep};
    use crate::app::matcher::TwoTierMatcher;
    use crate::domain::{BodyPart, Priority, Role, TaskDescriptor};
    use crate::impls::GridWorld;
    use crate::store::{TaskState, TaskStore};

    #[test]
    fn defend_task_bound_by_a_generalist_fails() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_controller("ctrl-1", (5, 5))
            .add_unit("generalist-1", (0, 0), &[BodyPart::Work, BodyPart::Carry, BodyPart::Move]);
        let mut store = TaskStore::in_memory();
        let id = store.create_task(
            TaskDescriptor::new(TaskKind::Defend, "ctrl-1", Priority::High).roles([Role::Generalist]),
        );
        let mut unit = Unit::new("generalist-1", Role::Generalist);

        let mut ctx = StepContext {
            store: &mut store,
            world: &mut world,
            matcher: &TwoTierMatcher,
        };
        let step = crate::app::behavior::step(&mut unit, &mut ctx);

        assert!(matches!(step, UnitStep::Acted(StepOutcome::Failed { .. })));
        assert!(unit.bound_task.is_none());
        assert_eq!(store.get(id).unwrap().state, TaskState::Failed);
        assert_eq!(store.purge_failed(), 1);
    }
}
