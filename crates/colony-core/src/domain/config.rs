//! Colony configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a working config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::body::PartCosts;
use super::errors::ColonyError;
use super::task::{Role, TaskKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyConfig {
    /// Ticks between sweeps of completed tasks.
    pub sweep_period: u64,

    /// Ticks between task validation runs.
    pub validate_period: u64,

    /// Ticks between discovery scans.
    pub scan_period: u64,

    /// Producer soft cap per role and scope.
    pub soft_caps: BTreeMap<Role, u32>,

    pub part_costs: PartCosts,

    pub max_body_parts: usize,

    /// Max retained decision records.
    pub decision_log_limit: usize,

    pub progress_limits: ProgressLimits,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        let soft_caps = [
            (Role::Miner, 2),
            (Role::Taxi, 1),
            (Role::Courier, 2),
            (Role::Builder, 1),
            (Role::Repairer, 1),
            (Role::Upgrader, 2),
            (Role::Generalist, 1),
        ]
        .into_iter()
        .collect();

        Self {
            sweep_period: 100,
            validate_period: 15,
            scan_period: 1,
            soft_caps,
            part_costs: PartCosts::default(),
            max_body_parts: 50,
            decision_log_limit: 256,
            progress_limits: ProgressLimits::default(),
        }
    }
}

impl ColonyConfig {
    pub fn from_json(s: &str) -> Result<Self, ColonyError> {
        serde_json::from_str(s).map_err(|e| ColonyError::Config(e.to_string()))
    }

    pub fn soft_cap(&self, role: Role) -> u32 {
        self.soft_caps.get(&role).copied().unwrap_or(0)
    }

    /// Every problem found, empty when the config is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, period) in [
            ("sweep_period", self.sweep_period),
            ("validate_period", self.validate_period),
            ("scan_period", self.scan_period),
        ] {
            if period == 0 {
                problems.push(format!("{name} must be > 0"));
            }
        }
        let costs = self.part_costs;
        if costs.work == 0 || costs.carry == 0 || costs.movement == 0 {
            problems.push("part costs must be > 0".to_string());
        }
        if self.max_body_parts == 0 {
            problems.push("max_body_parts must be > 0".to_string());
        }
        if self.progress_limits.long_running == 0 || self.progress_limits.short == 0 {
            problems.push("progress limits must be > 0".to_string());
        }
        problems
    }
}

/// Default `progress_limit` per task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressLimits {
    pub long_running: u32,
    pub short: u32,
}

impl Default for ProgressLimits {
    fn default() -> Self {
        Self {
            long_running: 1000,
            short: 100,
        }
    }
}

impl ProgressLimits {
    pub fn for_kind(&self, kind: TaskKind) -> u32 {
        if kind.is_long_running() {
            self.long_running
        } else {
            self.short
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reasonable() {
        let c = ColonyConfig::default();
        assert_eq!(c.sweep_period, 100);
        assert_eq!(c.validate_period, 15);
        assert_eq!(c.soft_cap(Role::Miner), 2);
        assert_eq!(c.soft_cap(Role::Taxi), 1);
        assert!(c.problems().is_empty());
    }

    #[test]
    fn config_without_soft_caps_then_get_default_soft_caps() {
        let json = r#"
        {
          "sweep_period": 50
        }"#;
        let c = ColonyConfig::from_json(json).expect("deserialize");
        assert_eq!(c.sweep_period, 50);
        assert_eq!(c.soft_cap(Role::Upgrader), 2);
        assert_eq!(c.progress_limits.for_kind(TaskKind::Build), 1000);
        assert_eq!(c.progress_limits.for_kind(TaskKind::Transport), 100);
    }

    #[test]
    fn zero_periods_are_reported() {
        let c = ColonyConfig {
            sweep_period: 0,
            scan_period: 0,
            ..ColonyConfig::default()
        };
        let problems = c.problems();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("sweep_period"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ColonyConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ColonyError::Config(_)));
    }
}
