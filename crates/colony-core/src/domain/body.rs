//! Body parts and their costs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One capability part of a unit's body.
///
/// Variant order is the part order inside a body: work, carry, move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    Work,
    Carry,
    Move,
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BodyPart::Work => "work",
            BodyPart::Carry => "carry",
            BodyPart::Move => "move",
        };
        f.write_str(s)
    }
}

/// Energy cost of each part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartCosts {
    pub work: u32,
    pub carry: u32,
    #[serde(rename = "move")]
    pub movement: u32,
}

impl Default for PartCosts {
    fn default() -> Self {
        Self {
            work: 100,
            carry: 50,
            movement: 50,
        }
    }
}

impl PartCosts {
    pub fn of(&self, part: BodyPart) -> u32 {
        match part {
            BodyPart::Work => self.work,
            BodyPart::Carry => self.carry,
            BodyPart::Move => self.movement,
        }
    }

    pub fn body_cost(&self, body: &[BodyPart]) -> u32 {
        body.iter().map(|p| self.of(*p)).sum()
    }
}

/// Number of `part` entries in `body`.
pub fn count_parts(body: &[BodyPart], part: BodyPart) -> usize {
    body.iter().filter(|p| **p == part).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_costs() {
        let costs = PartCosts::default();
        let body = [BodyPart::Work, BodyPart::Carry, BodyPart::Move];
        assert_eq!(costs.body_cost(&body), 200);
    }

    #[test]
    fn costs_use_move_key_in_json() {
        let costs: PartCosts = serde_json::from_str(r#"{ "move": 10 }"#).expect("deserialize");
        assert_eq!(costs.movement, 10);
        assert_eq!(costs.work, 100);
    }

    #[test]
    fn parts_sort_work_carry_move() {
        let mut body = vec![BodyPart::Move, BodyPart::Work, BodyPart::Carry, BodyPart::Work];
        body.sort();
        assert_eq!(
            body,
            vec![BodyPart::Work, BodyPart::Work, BodyPart::Carry, BodyPart::Move]
        );
        assert_eq!(count_parts(&body, BodyPart::Work), 2);
    }
}
