//! Body composition for a role and an energy budget.
//!
//! Pure and deterministic: the same inputs always give the same body.

use crate::domain::{BodyPart, PartCosts, Role, count_parts};

/// Part counts before they are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mix {
    work: usize,
    carry: usize,
    movement: usize,
}

impl Mix {
    fn total(&self) -> usize {
        self.work + self.carry + self.movement
    }

    /// Scale every count down proportionally so the total fits `max`.
    fn fit(self, max: usize) -> Self {
        let total = self.total();
        if total <= max {
            return self;
        }
        Self {
            work: self.work * max / total,
            carry: self.carry * max / total,
            movement: self.movement * max / total,
        }
    }

    fn into_body(self) -> Vec<BodyPart> {
        let mut body = Vec::with_capacity(self.total());
        body.extend(std::iter::repeat_n(BodyPart::Work, self.work));
        body.extend(std::iter::repeat_n(BodyPart::Carry, self.carry));
        body.extend(std::iter::repeat_n(BodyPart::Move, self.movement));
        body
    }
}

fn parts(budget: u32, cost: u32) -> usize {
    if cost == 0 {
        return 0;
    }
    (budget / cost) as usize
}

/// Body for `role` within `budget`, work parts first, then carry, then move.
///
/// The result may be empty or not viable when the budget is too small;
/// check with [`is_viable`].
pub fn build_body(role: Role, budget: u32, costs: &PartCosts, max_parts: usize) -> Vec<BodyPart> {
    let mix = match role {
        // immobile: a taxi brings it to the source
        Role::Miner => Mix {
            work: parts(budget, costs.work),
            carry: 0,
            movement: 0,
        },
        Role::Taxi | Role::Courier => {
            let pairs = parts(budget, costs.carry + costs.movement);
            Mix {
                work: 0,
                carry: pairs,
                movement: pairs,
            }
        }
        Role::Upgrader => Mix {
            work: parts(budget / 2, costs.work),
            carry: parts(budget / 4, costs.carry),
            movement: parts(budget / 4, costs.movement),
        },
        Role::Builder | Role::Repairer | Role::Generalist => {
            let third = budget / 3;
            Mix {
                work: parts(third, costs.work),
                carry: parts(third, costs.carry),
                movement: parts(third, costs.movement),
            }
        }
    };
    mix.fit(max_parts).into_body()
}

/// Whether `body` has every capability `role` needs.
pub fn is_viable(role: Role, body: &[BodyPart]) -> bool {
    let has = |part| count_parts(body, part) > 0;
    match role {
        Role::Miner => has(BodyPart::Work),
        Role::Taxi => has(BodyPart::Move),
        Role::Courier => has(BodyPart::Carry) && has(BodyPart::Move),
        Role::Builder | Role::Repairer | Role::Upgrader | Role::Generalist => {
            has(BodyPart::Work) && has(BodyPart::Carry) && has(BodyPart::Move)
        }
    }
}
