//! Taxi: tows an immobile miner to the source of its task.
//!
//! SeekCargo -> Approach -> Towing -> finish. The taxi never performs
//! resource actions itself.

use super::{Flow, StepContext, drive, unexpected};
use crate::domain::{EntityId, ExecutionPhase, StepOutcome, TaskKind, TaxiPhase, Unit, UnitId};
use crate::ports::{ActionOutcome, World};
use crate::store::{TaskRecord, TaskStore};

const ADJACENT: u32 = 1;

pub fn step(unit: &mut Unit, task: &TaskRecord, ctx: &mut StepContext<'_>) -> StepOutcome {
    let start = match &unit.phase {
        ExecutionPhase::Taxi(phase) => phase.clone(),
        _ => TaxiPhase::SeekCargo,
    };
    let destination = &task.target;

    let (phase, outcome) = drive(start, |phase| match phase {
        TaxiPhase::SeekCargo => match find_cargo(ctx.store, &*ctx.world, destination) {
            // no miner assigned yet: hold the task and wait
            None => Flow::Done(TaxiPhase::SeekCargo, StepOutcome::Continue),
            Some(cargo) if ctx.world.in_range(&cargo, destination, ADJACENT) => {
                Flow::Done(TaxiPhase::SeekCargo, StepOutcome::Finished)
            }
            Some(cargo) => Flow::Goto(TaxiPhase::Approach { cargo }),
        },
        TaxiPhase::Approach { cargo } => {
            if ctx.world.resolve(&cargo).is_none() {
                return Flow::Goto(TaxiPhase::SeekCargo);
            }
            if ctx.world.in_range(&unit.id, &cargo, ADJACENT) {
                return Flow::Goto(TaxiPhase::Towing { cargo });
            }
            match ctx.world.move_to(&unit.id, &cargo) {
                ActionOutcome::Ok | ActionOutcome::NotInRange => {}
                other => unexpected(unit, "move", other),
            }
            Flow::Done(TaxiPhase::Approach { cargo }, StepOutcome::Continue)
        }
        TaxiPhase::Towing { cargo } => tow(unit, ctx.world, cargo, destination),
    });

    unit.phase = ExecutionPhase::Taxi(phase);
    outcome
}

fn tow(unit: &Unit, world: &mut dyn World, cargo: UnitId, destination: &EntityId) -> Flow<TaxiPhase> {
    if world.resolve(&cargo).is_none() {
        return Flow::Goto(TaxiPhase::SeekCargo);
    }
    if world.in_range(&cargo, destination, ADJACENT) {
        return Flow::Done(TaxiPhase::Towing { cargo }, StepOutcome::Finished);
    }

    match world.tow(&unit.id, &cargo, destination) {
        ActionOutcome::Ok => {
            let outcome = if world.in_range(&cargo, destination, ADJACENT) {
                StepOutcome::Finished
            } else {
                StepOutcome::Continue
            };
            Flow::Done(TaxiPhase::Towing { cargo }, outcome)
        }
        ActionOutcome::NotInRange => Flow::Done(TaxiPhase::Approach { cargo }, StepOutcome::Continue),
        other => {
            unexpected(unit, "tow", other);
            Flow::Done(TaxiPhase::Towing { cargo }, StepOutcome::Continue)
        }
    }
}

/// A live unit assigned to the MineSource task on `source`.
fn find_cargo(store: &TaskStore, world: &dyn World, source: &EntityId) -> Option<UnitId> {
    store
        .find_live(TaskKind::MineSource, source)?
        .assignees
        .iter()
        .find(|unit| world.resolve(unit).is_some())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::behavior::{StepContext, UnitStep};
    use crate::app::binding;
    use crate::app::matcher::TwoTierMatcher;
    use crate::domain::{BodyPart, Priority, Role, TaskDescriptor};
    use crate::impls::GridWorld;
    use crate::store::TaskState;

    fn run(unit: &mut Unit, store: &mut TaskStore, world: &mut GridWorld) -> UnitStep {
        let mut ctx = StepContext {
            store,
            world,
            matcher: &TwoTierMatcher,
        };
        crate::app::behavior::step(unit, &mut ctx)
    }

    fn setup() -> (GridWorld, TaskStore, Unit, Unit) {
        let mut world = GridWorld::new("W1N1");
        world
            .add_source("src-1", (6, 0), 3000)
            .add_unit("miner-1", (0, 0), &[BodyPart::Work, BodyPart::Work])
            .add_unit("taxi-1", (0, 3), &[BodyPart::Move, BodyPart::Move]);
        let mut store = TaskStore::in_memory();
        store.create_task(
            TaskDescriptor::new(TaskKind::MineSource, "src-1", Priority::High)
                .roles([Role::Miner])
                .perpetual(),
        );
        store.create_task(
            TaskDescriptor::new(TaskKind::DeliverProducerUnit, "src-1", Priority::High)
                .roles([Role::Taxi]),
        );
        (
            world,
            store,
            Unit::new("miner-1", Role::Miner),
            Unit::new("taxi-1", Role::Taxi),
        )
    }

    #[test]
    fn taxi_waits_while_no_miner_is_assigned() {
        let (mut world, mut store, _, mut taxi) = setup();

        assert_eq!(
            run(&mut taxi, &mut store, &mut world),
            UnitStep::Acted(StepOutcome::Continue)
        );
        assert!(binding::has_task(&taxi));
        assert_eq!(taxi.phase, ExecutionPhase::Taxi(TaxiPhase::SeekCargo));
    }

    #[test]
    fn taxi_tows_miner_to_source_then_miner_harvests() {
        let (mut world, mut store, mut miner, mut taxi) = setup();

        // the miner binds but cannot move
        run(&mut miner, &mut store, &mut world);
        assert!(binding::has_task(&miner));
        assert_eq!(world.position(&EntityId::from("miner-1")), Some((0, 0)));

        let mut delivered = false;
        for _ in 0..20 {
            if run(&mut taxi, &mut store, &mut world) == UnitStep::Acted(StepOutcome::Finished) {
                delivered = true;
                break;
            }
            run(&mut miner, &mut store, &mut world);
            world.advance();
        }
        assert!(delivered);
        assert!(world.in_range(&EntityId::from("miner-1"), &EntityId::from("src-1"), 1));

        let taxi_task = store
            .tasks()
            .find(|t| t.kind == TaskKind::DeliverProducerUnit)
            .unwrap();
        assert_eq!(taxi_task.state, TaskState::Completed);

        run(&mut miner, &mut store, &mut world);
        let mine = store.find_live(TaskKind::MineSource, &EntityId::from("src-1")).unwrap();
        assert!(mine.progress > 0);
    }
}
