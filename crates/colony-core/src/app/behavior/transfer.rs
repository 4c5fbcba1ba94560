//! Transfer-energy machine (couriers and generalists).
//!
//! SeekSource -> Collecting -> SeekDestination -> Delivering, then the cycle
//! finishes and the task is completed so the unit is matched again.
//!
//! Source preference: ground pile > container/storage with energy > harvesting
//! node. Destination preference: spawn/extension needing energy > storage
//! needing energy > adjacent controller.

use super::{Flow, StepContext, drive, unexpected};
use crate::domain::{
    BodyPart, CollectMethod, DecisionRecord, DeliverMethod, EntityId, ExecutionPhase, StepOutcome,
    TransferPhase, Unit,
};
use crate::ports::{ActionOutcome, EntityKind, EntityView, World};
use crate::store::TaskRecord;

const CONTROLLER_RANGE: u32 = 1;

/// `pinned` fixes the source (the task target for MineSource / CollectFromPile).
pub fn step(
    unit: &mut Unit,
    task: &TaskRecord,
    ctx: &mut StepContext<'_>,
    pinned: Option<&EntityId>,
) -> StepOutcome {
    let start = match &unit.phase {
        ExecutionPhase::Transfer(phase) => phase.clone(),
        _ => TransferPhase::SeekSource,
    };

    let (phase, outcome) = drive(start, |phase| {
        let Some(me) = ctx.world.resolve(&unit.id) else {
            return Flow::Done(phase, StepOutcome::abandon("unit missing"));
        };
        match phase {
            TransferPhase::SeekSource => seek_source(&me, &*ctx.world, pinned),
            TransferPhase::Collecting { source, method } => {
                collecting(unit, &me, ctx.world, source, method)
            }
            TransferPhase::SeekDestination => {
                let flow = seek_destination(&me, &*ctx.world);
                if matches!(flow, Flow::Done(_, StepOutcome::Finished)) {
                    // nowhere to deliver: finish anyway, but leave a trace
                    let tick = ctx.store.tick();
                    ctx.store.record_decision(DecisionRecord::new(
                        task.id,
                        tick,
                        serde_json::json!({ "unit": unit.id, "energy": me.energy }),
                        "no_destination",
                        "finish_cycle",
                    ));
                }
                flow
            }
            TransferPhase::Delivering {
                destination,
                method,
            } => delivering(unit, &me, ctx.world, destination, method),
        }
    });

    unit.phase = ExecutionPhase::Transfer(phase);
    outcome
}

fn seek_source(me: &EntityView, world: &dyn World, pinned: Option<&EntityId>) -> Flow<TransferPhase> {
    if me.energy_capacity == 0 {
        return Flow::Done(
            TransferPhase::SeekSource,
            StepOutcome::abandon("unit cannot carry"),
        );
    }
    if me.is_full() {
        return Flow::Goto(TransferPhase::SeekDestination);
    }

    let found = match pinned {
        Some(id) => world
            .resolve(id)
            .and_then(|source| collect_method(&source, me).map(|m| (source.id, m))),
        None => find_source(world, me),
    };

    match found {
        Some((source, method)) => Flow::Goto(TransferPhase::Collecting { source, method }),
        None if me.has_energy() => Flow::Goto(TransferPhase::SeekDestination),
        None => Flow::Done(TransferPhase::SeekSource, StepOutcome::Continue),
    }
}

fn collecting(
    unit: &Unit,
    me: &EntityView,
    world: &mut dyn World,
    source: EntityId,
    method: CollectMethod,
) -> Flow<TransferPhase> {
    if me.is_full() {
        return Flow::Goto(TransferPhase::SeekDestination);
    }
    let fallback = if me.has_energy() {
        TransferPhase::SeekDestination
    } else {
        TransferPhase::SeekSource
    };
    if world.resolve(&source).is_none() {
        return Flow::Goto(fallback);
    }

    let result = match method {
        CollectMethod::Pickup => world.pickup(&unit.id, &source),
        CollectMethod::Withdraw => world.withdraw(&unit.id, &source),
        CollectMethod::Harvest => world.harvest(&unit.id, &source),
    };
    match result {
        ActionOutcome::Ok => {
            let full = world.resolve(&unit.id).is_some_and(|v| v.is_full());
            let next = if full {
                TransferPhase::SeekDestination
            } else {
                TransferPhase::Collecting { source, method }
            };
            Flow::Done(next, StepOutcome::Continue)
        }
        ActionOutcome::NotInRange => {
            world.move_to(&unit.id, &source);
            Flow::Done(TransferPhase::Collecting { source, method }, StepOutcome::Continue)
        }
        ActionOutcome::Full => Flow::Done(TransferPhase::SeekDestination, StepOutcome::Continue),
        ActionOutcome::NoResource | ActionOutcome::InvalidTarget => {
            Flow::Done(fallback, StepOutcome::Continue)
        }
        other => {
            unexpected(unit, "collect", other);
            Flow::Done(TransferPhase::Collecting { source, method }, StepOutcome::Continue)
        }
    }
}

fn seek_destination(me: &EntityView, world: &dyn World) -> Flow<TransferPhase> {
    match find_destination(world, me) {
        None => Flow::Done(TransferPhase::SeekDestination, StepOutcome::Finished),
        Some(_) if !me.has_energy() => Flow::Goto(TransferPhase::SeekSource),
        Some((destination, method)) => Flow::Goto(TransferPhase::Delivering {
            destination,
            method,
        }),
    }
}

fn delivering(
    unit: &Unit,
    me: &EntityView,
    world: &mut dyn World,
    destination: EntityId,
    method: DeliverMethod,
) -> Flow<TransferPhase> {
    if !me.has_energy() {
        return Flow::Done(TransferPhase::SeekSource, StepOutcome::Finished);
    }
    if world.resolve(&destination).is_none() {
        return Flow::Goto(TransferPhase::SeekDestination);
    }

    let result = match method {
        DeliverMethod::Transfer => world.transfer(&unit.id, &destination),
        DeliverMethod::Upgrade => world.upgrade(&unit.id, &destination),
    };
    match result {
        ActionOutcome::Ok => {
            let empty = world.resolve(&unit.id).is_none_or(|v| !v.has_energy());
            let outcome = if empty {
                StepOutcome::Finished
            } else {
                StepOutcome::Continue
            };
            Flow::Done(
                TransferPhase::Delivering {
                    destination,
                    method,
                },
                outcome,
            )
        }
        ActionOutcome::NotInRange => {
            world.move_to(&unit.id, &destination);
            Flow::Done(
                TransferPhase::Delivering {
                    destination,
                    method,
                },
                StepOutcome::Continue,
            )
        }
        ActionOutcome::Full | ActionOutcome::NoResource => {
            Flow::Done(TransferPhase::SeekSource, StepOutcome::Finished)
        }
        ActionOutcome::InvalidTarget => {
            Flow::Done(TransferPhase::SeekDestination, StepOutcome::Continue)
        }
        other => {
            unexpected(unit, "deliver", other);
            Flow::Done(
                TransferPhase::Delivering {
                    destination,
                    method,
                },
                StepOutcome::Continue,
            )
        }
    }
}

/// How `me` can take energy from `source`, if at all.
fn collect_method(source: &EntityView, me: &EntityView) -> Option<CollectMethod> {
    if !source.has_energy() {
        return None;
    }
    match source.kind {
        EntityKind::Pile => Some(CollectMethod::Pickup),
        EntityKind::Container | EntityKind::Storage => Some(CollectMethod::Withdraw),
        EntityKind::Source if me.has_part(BodyPart::Work) => Some(CollectMethod::Harvest),
        _ => None,
    }
}

fn find_source(world: &dyn World, me: &EntityView) -> Option<(EntityId, CollectMethod)> {
    let pile = |e: &EntityView| e.kind == EntityKind::Pile && e.has_energy();
    if let Some(id) = world.find_nearest(&me.id, &pile) {
        return Some((id, CollectMethod::Pickup));
    }

    // storage only feeds spawns; taking from it to put it back is pointless
    let feed_needed = world.find_nearest(&me.id, &spawn_needing_energy).is_some();
    let stored = |e: &EntityView| {
        e.has_energy()
            && (e.kind == EntityKind::Container || (feed_needed && e.kind == EntityKind::Storage))
    };
    if let Some(id) = world.find_nearest(&me.id, &stored) {
        return Some((id, CollectMethod::Withdraw));
    }

    if me.has_part(BodyPart::Work) {
        let node = |e: &EntityView| e.kind == EntityKind::Source && e.has_energy();
        if let Some(id) = world.find_nearest(&me.id, &node) {
            return Some((id, CollectMethod::Harvest));
        }
    }
    None
}

fn spawn_needing_energy(e: &EntityView) -> bool {
    e.my && matches!(e.kind, EntityKind::Spawn | EntityKind::Extension) && e.needs_energy()
}

fn find_destination(world: &dyn World, me: &EntityView) -> Option<(EntityId, DeliverMethod)> {
    if let Some(id) = world.find_nearest(&me.id, &spawn_needing_energy) {
        return Some((id, DeliverMethod::Transfer));
    }

    let storage = |e: &EntityView| e.my && e.kind == EntityKind::Storage && e.needs_energy();
    if let Some(id) = world.find_nearest(&me.id, &storage) {
        return Some((id, DeliverMethod::Transfer));
    }

    let controller = |e: &EntityView| e.my && e.kind == EntityKind::Controller;
    world
        .find_in_range(&me.id, CONTROLLER_RANGE, &controller)
        .into_iter()
        .next()
        .map(|id| (id, DeliverMethod::Upgrade))
}
