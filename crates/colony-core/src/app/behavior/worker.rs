//! Builder / repairer / upgrader machine.
//!
//! Works the target while carrying energy; when empty, refills from the
//! nearest storage or container, else from a friendly spawn, until full.

use super::{Flow, StepContext, drive, unexpected};
use crate::app::binding;
use crate::domain::{EntityId, ExecutionPhase, StepOutcome, TaskKind, Unit, WorkPhase};
use crate::ports::{ActionOutcome, EntityKind, EntityView, World};
use crate::store::TaskRecord;

pub fn step(unit: &mut Unit, task: &TaskRecord, ctx: &mut StepContext<'_>) -> StepOutcome {
    let start = match &unit.phase {
        ExecutionPhase::Work(phase) => phase.clone(),
        _ => WorkPhase::Working,
    };

    let (phase, outcome) = drive(start, |phase| {
        let Some(me) = ctx.world.resolve(&unit.id) else {
            return Flow::Done(phase, StepOutcome::abandon("unit missing"));
        };
        match phase {
            WorkPhase::Working => {
                if !me.has_energy() {
                    return Flow::Goto(WorkPhase::Refilling { from: None });
                }
                let (flow, progressed) = work(unit, task, ctx.world);
                if progressed {
                    binding::report_progress(ctx.store, unit, task.progress.saturating_add(1));
                }
                flow
            }
            WorkPhase::Refilling { from } => refill(unit, &me, ctx.world, from),
        }
    });

    unit.phase = ExecutionPhase::Work(phase);
    outcome
}

/// One work action on the target. The flag is true when the action succeeded.
fn work(unit: &Unit, task: &TaskRecord, world: &mut dyn World) -> (Flow<WorkPhase>, bool) {
    let target = &task.target;
    let result = match task.kind {
        TaskKind::Build => world.build(&unit.id, target),
        TaskKind::Repair => world.repair(&unit.id, target),
        TaskKind::Upgrade => world.upgrade(&unit.id, target),
        other => {
            let reason = format!("{other} is not work");
            return (Flow::Done(WorkPhase::Working, StepOutcome::failed(reason)), false);
        }
    };

    let flow = match result {
        ActionOutcome::Ok => {
            let outcome = if target_done(world, task) {
                StepOutcome::Finished
            } else {
                StepOutcome::Continue
            };
            return (Flow::Done(WorkPhase::Working, outcome), true);
        }
        ActionOutcome::NotInRange => {
            world.move_to(&unit.id, target);
            Flow::Done(WorkPhase::Working, StepOutcome::Continue)
        }
        ActionOutcome::NoResource => {
            Flow::Done(WorkPhase::Refilling { from: None }, StepOutcome::Continue)
        }
        // nothing left to do on the target
        ActionOutcome::Full => Flow::Done(WorkPhase::Working, StepOutcome::Finished),
        ActionOutcome::InvalidTarget => Flow::Done(
            WorkPhase::Working,
            StepOutcome::abandon("invalid work target"),
        ),
        other => {
            unexpected(unit, "work", other);
            Flow::Done(WorkPhase::Working, StepOutcome::Continue)
        }
    };
    (flow, false)
}

/// Build and repair complete when the target says so. Upgrading never does.
fn target_done(world: &dyn World, task: &TaskRecord) -> bool {
    let Some(target) = world.resolve(&task.target) else {
        return false;
    };
    match task.kind {
        TaskKind::Build => target.is_built(),
        TaskKind::Repair => !target.is_damaged(),
        _ => false,
    }
}

fn refill(
    unit: &Unit,
    me: &EntityView,
    world: &mut dyn World,
    from: Option<EntityId>,
) -> Flow<WorkPhase> {
    if me.is_full() {
        return Flow::Goto(WorkPhase::Working);
    }

    let from = from
        .filter(|id| world.resolve(id).is_some_and(|v| v.has_energy()))
        .or_else(|| find_refill(&*world, me));
    let Some(from) = from else {
        // nothing to refill from: spend what we carry, or wait
        return if me.has_energy() {
            Flow::Goto(WorkPhase::Working)
        } else {
            Flow::Done(WorkPhase::Refilling { from: None }, StepOutcome::Continue)
        };
    };

    match world.withdraw(&unit.id, &from) {
        ActionOutcome::Ok => {
            let full = world.resolve(&unit.id).is_some_and(|v| v.is_full());
            let next = if full {
                WorkPhase::Working
            } else {
                WorkPhase::Refilling { from: Some(from) }
            };
            Flow::Done(next, StepOutcome::Continue)
        }
        ActionOutcome::NotInRange => {
            world.move_to(&unit.id, &from);
            Flow::Done(WorkPhase::Refilling { from: Some(from) }, StepOutcome::Continue)
        }
        ActionOutcome::Full => Flow::Done(WorkPhase::Working, StepOutcome::Continue),
        ActionOutcome::NoResource | ActionOutcome::InvalidTarget => {
            Flow::Done(WorkPhase::Refilling { from: None }, StepOutcome::Continue)
        }
        other => {
            unexpected(unit, "withdraw", other);
            Flow::Done(WorkPhase::Refilling { from: Some(from) }, StepOutcome::Continue)
        }
    }
}

fn find_refill(world: &dyn World, me: &EntityView) -> Option<EntityId> {
    let stored = |e: &EntityView| {
        matches!(e.kind, EntityKind::Storage | EntityKind::Container) && e.has_energy()
    };
    if let Some(id) = world.find_nearest(&me.id, &stored) {
        return Some(id);
    }
    let spawn = |e: &EntityView| e.my && e.kind == EntityKind::Spawn && e.has_energy();
    world.find_nearest(&me.id, &spawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::behavior::{StepContext, UnitStep};
    use crate::app::matcher::TwoTierMatcher;
    use crate::domain::{BodyPart, Priority, Role, TaskDescriptor};
    use crate::impls::GridWorld;
    use crate::store::{TaskState, TaskStore};

    const BALANCED: [BodyPart; 3] = [BodyPart::Work, BodyPart::Carry, BodyPart::Move];

    fn run(unit: &mut Unit, store: &mut TaskStore, world: &mut GridWorld) -> UnitStep {
        let mut ctx = StepContext {
            store,
            world,
            matcher: &TwoTierMatcher,
        };
        crate::app::behavior::step(unit, &mut ctx)
    }

    #[test]
    fn builder_refills_then_builds_site_to_completion() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_spawn("spawn-1", (0, 0), 300)
            .add_site("site-1", (4, 0), 10)
            .add_unit("builder-1", (1, 0), &BALANCED);
        let mut store = TaskStore::in_memory();
        let id = store.create_task(
            TaskDescriptor::new(TaskKind::Build, "site-1", Priority::Medium)
                .roles([Role::Builder])
                .capacity(2),
        );
        let mut unit = Unit::new("builder-1", Role::Builder);

        // empty: refill from the spawn first
        run(&mut unit, &mut store, &mut world);
        assert_eq!(
            unit.phase,
            ExecutionPhase::Work(WorkPhase::Working),
            "one withdraw fills a single carry part"
        );
        assert_eq!(world.resolve(&EntityId::from("builder-1")).unwrap().energy, 50);

        let mut finished = false;
        for _ in 0..10 {
            world.advance();
            if run(&mut unit, &mut store, &mut world) == UnitStep::Acted(StepOutcome::Finished) {
                finished = true;
                break;
            }
        }

        assert!(finished);
        assert_eq!(store.get(id).unwrap().state, TaskState::Completed);
        assert!(store.get(id).unwrap().progress > 0);
    }

    #[test]
    fn repairer_completes_when_hits_are_full() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_structure("road-1", crate::ports::EntityKind::Road, (1, 1), 4900, 5000)
            .add_unit("repairer-1", (0, 0), &BALANCED)
            .set_energy("repairer-1", 50);
        let mut store = TaskStore::in_memory();
        let id = store.create_task(
            TaskDescriptor::new(TaskKind::Repair, "road-1", Priority::Medium).roles([Role::Repairer]),
        );
        let mut unit = Unit::new("repairer-1", Role::Repairer);

        assert_eq!(
            run(&mut unit, &mut store, &mut world),
            UnitStep::Acted(StepOutcome::Finished)
        );
        assert_eq!(store.get(id).unwrap().state, TaskState::Completed);
    }

    #[test]
    fn upgrader_never_completes_on_its_own() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_controller("ctrl-1", (2, 2))
            .add_storage("storage-1", (0, 1), 10_000)
            .add_unit("upgrader-1", (0, 0), &BALANCED);
        let mut store = TaskStore::in_memory();
        let id = store.create_task(
            TaskDescriptor::new(TaskKind::Upgrade, "ctrl-1", Priority::Medium)
                .roles([Role::Upgrader])
                .perpetual()
                .capacity(2),
        );
        let mut unit = Unit::new("upgrader-1", Role::Upgrader);

        for _ in 0..30 {
            let step = run(&mut unit, &mut store, &mut world);
            assert_eq!(step, UnitStep::Acted(StepOutcome::Continue));
            world.advance();
        }
        assert_eq!(store.get(id).unwrap().state, TaskState::InProgress);
        assert!(world.resolve(&EntityId::from("ctrl-1")).unwrap().progress > 0);
    }
}
