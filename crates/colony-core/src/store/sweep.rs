//! Sweep policy: decides which periodic store jobs are due on a tick.

use crate::domain::ColonyConfig;

/// Periods (in ticks) of the colony's housekeeping jobs.
///
/// Periodic work is keyed on the tick number, so a colony restored from a
/// snapshot keeps the same schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// Remove Completed tasks.
    pub sweep_period: u64,

    /// Check live tasks against the world.
    pub validate_period: u64,

    /// Ask discovery for new work.
    pub scan_period: u64,
}

impl SweepPolicy {
    /// Default policy (sweep every 100 ticks, validate every 15, scan every tick).
    pub fn default_v1() -> Self {
        Self::from_config(&ColonyConfig::default())
    }

    pub fn from_config(config: &ColonyConfig) -> Self {
        Self {
            sweep_period: config.sweep_period,
            validate_period: config.validate_period,
            scan_period: config.scan_period,
        }
    }

    pub fn should_sweep(&self, tick: u64) -> bool {
        is_due(self.sweep_period, tick)
    }

    pub fn should_validate(&self, tick: u64) -> bool {
        is_due(self.validate_period, tick)
    }

    pub fn should_scan(&self, tick: u64) -> bool {
        is_due(self.scan_period, tick)
    }
}

/// A zero period never fires.
fn is_due(period: u64, tick: u64) -> bool {
    period != 0 && tick % period == 0
}
