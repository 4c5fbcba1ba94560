//! Role behaviors - ユニット 1 体を 1 tick 進める
//!
//! 共通の骨格:
//! 1. ターゲットが解決できなければ release（運搬中のエネルギーは配達を続ける）
//! 2. タスクが無ければ Matcher に聞いて acquire（ターゲットの無い候補は飛ばす、無ければ idle）
//! 3. role ごとのハンドラが world アクションを 1 回行い `StepOutcome` を返す
//! 4. 外側で `StepOutcome` を complete / release / fail に変換

pub mod generalist;
pub mod miner;
pub mod taxi;
pub mod transfer;
pub mod worker;

use crate::app::binding;
use crate::app::matcher::Matcher;
use crate::domain::{ExecutionPhase, Role, StepOutcome, TaskKind, TransferPhase, Unit};
use crate::ports::{EntityView, World};
use crate::store::{TaskRecord, TaskStore};

/// Everything a handler may touch during one unit step.
pub struct StepContext<'a> {
    pub store: &'a mut TaskStore,
    pub world: &'a mut dyn World,
    pub matcher: &'a dyn Matcher,
}

/// What one unit did this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStep {
    /// Still being produced, not stepped.
    Spawning,
    /// No task matched.
    Idle,
    Acted(StepOutcome),
}

/// Step one unit.
pub fn step(unit: &mut Unit, ctx: &mut StepContext<'_>) -> UnitStep {
    let me = match ctx.world.resolve(&unit.id) {
        Some(view) if view.busy => return UnitStep::Spawning,
        Some(view) => view,
        None => return UnitStep::Idle,
    };

    binding::check_binding(ctx.store, unit);

    // a vanished target: give the task back and look for other work right away
    let released = unit
        .bound_task
        .and_then(|id| ctx.store.get(id))
        .is_some_and(|task| {
            ctx.world.resolve(&task.target).is_none() && !carries_on_without_source(unit, task, &me)
        });
    if released {
        binding::release(ctx.store, unit, "target missing");
    }

    if !binding::has_task(unit)
        && binding::acquire_best(ctx.store, ctx.matcher, &*ctx.world, unit).is_none()
    {
        return if released {
            UnitStep::Acted(StepOutcome::abandon("target missing"))
        } else {
            UnitStep::Idle
        };
    }
    let Some(task) = unit.bound_task.and_then(|id| ctx.store.get(id)).cloned() else {
        unit.clear_binding();
        return UnitStep::Idle;
    };

    let before = unit.phase.clone();
    let outcome = run_role(unit, &task, ctx);
    if unit.phase != before {
        tracing::debug!(unit = %unit.id, task = %task.id, phase = ?unit.phase, "phase changed");
    }
    apply(unit, ctx.store, &outcome);
    UnitStep::Acted(outcome)
}

/// A transfer cycle whose pinned source is gone keeps going once the unit
/// carries energy: the load still has to be delivered.
fn carries_on_without_source(unit: &Unit, task: &TaskRecord, me: &EntityView) -> bool {
    let pinned = matches!(task.kind, TaskKind::MineSource | TaskKind::CollectFromPile);
    let past_collecting = matches!(
        unit.phase,
        ExecutionPhase::Transfer(
            TransferPhase::Collecting { .. }
                | TransferPhase::SeekDestination
                | TransferPhase::Delivering { .. }
        )
    );
    pinned && past_collecting && me.has_energy()
}

fn run_role(unit: &mut Unit, task: &TaskRecord, ctx: &mut StepContext<'_>) -> StepOutcome {
    use TaskKind::*;

    match (unit.role, task.kind) {
        (Role::Miner, MineSource) => miner::step(unit, task, ctx),
        (Role::Taxi, DeliverProducerUnit) => taxi::step(unit, task, ctx),
        (Role::Courier, CollectFromPile) => transfer::step(unit, task, ctx, Some(&task.target)),
        (Role::Courier, Transport) => transfer::step(unit, task, ctx, None),
        (Role::Builder | Role::Repairer | Role::Upgrader, Build | Repair | Upgrade) => {
            worker::step(unit, task, ctx)
        }
        (Role::Generalist, _) => generalist::step(unit, task, ctx),
        (role, kind) => StepOutcome::failed(format!("{kind} is not executable by {role}")),
    }
}

/// Turn a handler's outcome into the matching binding call.
fn apply(unit: &mut Unit, store: &mut TaskStore, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Continue => {}
        StepOutcome::Finished => binding::complete(store, unit),
        StepOutcome::Abandon { reason } => {
            tracing::debug!(unit = %unit.id, reason = %reason, "task abandoned");
            binding::release(store, unit, reason);
        }
        StepOutcome::Failed { reason } => {
            tracing::warn!(unit = %unit.id, reason = %reason, "invalid task data");
            binding::fail(store, unit, reason);
        }
    }
}

/// Result of one phase handler inside a multi-phase machine.
pub(crate) enum Flow<P> {
    /// No world action taken, evaluate `P` right away.
    Goto(P),
    /// Stop for this tick in `P`.
    Done(P, StepOutcome),
}

/// Phase hops without a world action allowed per tick.
const MAX_TRANSITIONS: usize = 4;

/// Run phase handlers until one stops. Bounded, so a machine can never spin within a tick.
pub(crate) fn drive<P>(start: P, mut handle: impl FnMut(P) -> Flow<P>) -> (P, StepOutcome) {
    let mut phase = start;
    for _ in 0..MAX_TRANSITIONS {
        match handle(phase) {
            Flow::Goto(next) => phase = next,
            Flow::Done(next, outcome) => return (next, outcome),
        }
    }
    (phase, StepOutcome::Continue)
}

/// Log an outcome the handler has no rule for. The unit retries next tick.
pub(crate) fn unexpected(unit: &Unit, action: &str, outcome: crate::ports::ActionOutcome) {
    tracing::warn!(unit = %unit.id, action, outcome = ?outcome, "unexpected world outcome");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::matcher::TwoTierMatcher;
    use crate::domain::{BodyPart, Priority, TaskDescriptor};
    use crate::impls::GridWorld;
    use crate::store::TaskState;

    fn run(unit: &mut Unit, store: &mut TaskStore, world: &mut GridWorld) -> UnitStep {
        let mut ctx = StepContext {
            store,
            world,
            matcher: &TwoTierMatcher,
        };
        step(unit, &mut ctx)
    }

    fn build(store: &mut TaskStore, site: &str, priority: Priority) -> crate::domain::TaskId {
        store.create_task(TaskDescriptor::new(TaskKind::Build, site, priority).roles([Role::Builder]))
    }

    #[test]
    fn missing_target_does_not_starve_lower_ranked_work() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_spawn("spawn-1", (0, 0), 300)
            .add_site("site-ok", (2, 0), 300)
            .add_unit("builder-1", (1, 0), &[BodyPart::Work, BodyPart::Carry, BodyPart::Move]);
        let mut store = TaskStore::in_memory();
        let gone = build(&mut store, "site-gone", Priority::High);
        let ok = build(&mut store, "site-ok", Priority::Low);
        let mut unit = Unit::new("builder-1", Role::Builder);

        for _ in 0..10 {
            let outcome = run(&mut unit, &mut store, &mut world);
            assert!(!matches!(outcome, UnitStep::Acted(StepOutcome::Abandon { .. })));
        }

        assert_eq!(unit.bound_task, Some(ok));
        assert!(store.get(ok).unwrap().progress > 0);
        assert_eq!(store.get(gone).unwrap().state, TaskState::Pending);
    }

    #[test]
    fn unit_whose_target_vanishes_takes_other_work_in_the_same_step() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_spawn("spawn-1", (0, 0), 300)
            .add_site("site-a", (2, 0), 300)
            .add_site("site-b", (0, 2), 300)
            .add_unit("builder-1", (1, 1), &[BodyPart::Work, BodyPart::Carry, BodyPart::Move]);
        let mut store = TaskStore::in_memory();
        let a = build(&mut store, "site-a", Priority::High);
        let b = build(&mut store, "site-b", Priority::Low);
        let mut unit = Unit::new("builder-1", Role::Builder);
        run(&mut unit, &mut store, &mut world);
        assert_eq!(unit.bound_task, Some(a));

        world.remove("site-a");
        let outcome = run(&mut unit, &mut store, &mut world);

        assert!(matches!(outcome, UnitStep::Acted(StepOutcome::Continue)));
        assert_eq!(unit.bound_task, Some(b));
        let released = store.get(a).unwrap();
        assert_eq!(released.state, TaskState::Pending);
        assert!(released.assignees.is_empty());
        assert!(store
            .decisions()
            .any(|d| d.policy == "unit_release" && d.trigger["unit"] == "builder-1"));
    }

    #[test]
    fn missing_target_with_nothing_else_to_do_reports_abandon() {
        let mut world = GridWorld::new("W1N1");
        world
            .add_site("site-a", (2, 0), 300)
            .add_unit("builder-1", (1, 0), &[BodyPart::Work, BodyPart::Carry, BodyPart::Move]);
        let mut store = TaskStore::in_memory();
        let a = build(&mut store, "site-a", Priority::High);
        let mut unit = Unit::new("builder-1", Role::Builder);
        run(&mut unit, &mut store, &mut world);
        assert_eq!(unit.bound_task, Some(a));

        world.remove("site-a");

        assert_eq!(
            run(&mut unit, &mut store, &mut world),
            UnitStep::Acted(StepOutcome::abandon("target missing"))
        );
        assert_eq!(run(&mut unit, &mut store, &mut world), UnitStep::Idle);
    }

    #[test]
    fn drive_stops_on_done() {
        let (phase, outcome) = drive(0u32, |p| {
            if p < 2 {
                Flow::Goto(p + 1)
            } else {
                Flow::Done(p, StepOutcome::Finished)
            }
        });
        assert_eq!(phase, 2);
        assert_eq!(outcome, StepOutcome::Finished);
    }

    #[test]
    fn drive_is_bounded() {
        let mut calls = 0;
        let (_, outcome) = drive((), |p| {
            calls += 1;
            Flow::Goto(p)
        });
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(calls, MAX_TRANSITIONS);
    }
}
