//! Miner: harvests its bound source. Never moves itself.

use super::{StepContext, unexpected};
use crate::app::binding;
use crate::domain::{StepOutcome, Unit};
use crate::ports::ActionOutcome;
use crate::store::TaskRecord;

const HARVEST_RANGE: u32 = 1;

pub fn step(unit: &mut Unit, task: &TaskRecord, ctx: &mut StepContext<'_>) -> StepOutcome {
    // immobile: wait for a taxi to bring us next to the source
    if !ctx.world.in_range(&unit.id, &task.target, HARVEST_RANGE) {
        return StepOutcome::Continue;
    }

    match ctx.world.harvest(&unit.id, &task.target) {
        ActionOutcome::Ok => {
            binding::report_progress(ctx.store, unit, task.progress.saturating_add(1));
            StepOutcome::Continue
        }
        ActionOutcome::NoResource => StepOutcome::Finished,
        ActionOutcome::NotInRange => StepOutcome::Continue,
        ActionOutcome::InvalidTarget => StepOutcome::abandon("cannot harvest target"),
        other => {
            unexpected(unit, "harvest", other);
            StepOutcome::Continue
        }
    }
}
