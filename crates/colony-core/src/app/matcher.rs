//! Task matcher: ranks open tasks for a requesting unit.

use crate::domain::{Role, Scope, TaskId, Unit};
use crate::store::TaskStore;

/// Trait for ranking the tasks a unit could take.
///
/// Matchers are pure: given the store and the requester, they return
/// candidates best first without touching anything. Binding the winner (and
/// falling back to the next candidate when the bind is rejected) is done by
/// the caller.
pub trait Matcher: Send + Sync {
    /// Candidates for `role` in `scope`, best first.
    fn candidates(&self, store: &TaskStore, role: Role, scope: Option<&Scope>) -> Vec<TaskId>;

    fn find_best_for(&self, store: &TaskStore, unit: &Unit) -> Option<TaskId> {
        self.candidates(store, unit.role, unit.scope.as_ref())
            .into_iter()
            .next()
    }
}

/// Default matcher.
///
/// Two tiers:
/// 1. single-assignee tasks (capacity 1), in store order;
/// 2. group tasks with room, fewest assignees first, ties in store order.
///
/// Exclusive work is claimed before group tasks are topped up, and group
/// tasks fill up evenly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoTierMatcher;

impl Matcher for TwoTierMatcher {
    fn candidates(&self, store: &TaskStore, role: Role, scope: Option<&Scope>) -> Vec<TaskId> {
        let (singles, mut groups): (Vec<_>, Vec<_>) = store
            .list_pending(role, scope)
            .into_iter()
            .partition(|t| t.capacity == 1);

        // stable: equal assignee counts keep store order
        groups.sort_by_key(|t| t.assignees.len());

        singles
            .into_iter()
            .chain(groups)
            .map(|t| t.id)
            .collect()
    }
}
