//! In-memory task store.

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::{TaskRecord, TaskState};
use crate::app::status::TaskCounts;
use crate::domain::{
    BindRejection, ColonyError, DecisionRecord, EntityId, ProgressLimits, Role, Scope,
    TaskDescriptor, TaskId, TaskKind, UnitId,
};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator};

/// The canonical set of tasks.
///
/// Design:
/// - One explicit object, injected by reference into every component that needs it.
/// - Every mutator is an atomic step with respect to the tick loop: it leaves
///   all record invariants intact before returning.
/// - Bind decisions take effect immediately, so a unit stepping later in the
///   same tick sees the slot as taken.
pub struct TaskStore {
    tasks: BTreeMap<TaskId, TaskRecord>,
    next_seq: u64,
    tick: u64,
    limits: ProgressLimits,
    decisions: VecDeque<DecisionRecord>,
    decision_limit: usize,
    ids: Box<dyn IdGenerator>,
}

/// The persisted part of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub tasks: Vec<TaskRecord>,
    pub next_seq: u64,
}

impl TaskStore {
    pub fn new(ids: Box<dyn IdGenerator>, limits: ProgressLimits, decision_limit: usize) -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_seq: 0,
            tick: 0,
            limits,
            decisions: VecDeque::new(),
            decision_limit,
            ids,
        }
    }

    /// ULID ids from the system clock, default limits.
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(UlidGenerator::new(SystemClock)),
            ProgressLimits::default(),
            256,
        )
    }

    /// Current tick, used as `created_at` and on decision records.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Create a Pending task. No side effects on the world.
    pub fn create_task(&mut self, descriptor: TaskDescriptor) -> TaskId {
        let id = self.ids.generate_task_id();
        let limit = self.limits.for_kind(descriptor.kind);
        let record = TaskRecord::new(id, descriptor, limit, self.tick, self.next_seq);
        self.next_seq += 1;

        tracing::info!(
            task = %id,
            kind = %record.kind,
            target = %record.target,
            "task created"
        );
        self.tasks.insert(id, record);
        id
    }

    /// Create unless a live task already covers `(kind, target)`.
    pub fn create_unique(&mut self, descriptor: TaskDescriptor) -> Option<TaskId> {
        if descriptor.kind.is_target_scoped()
            && self.find_live(descriptor.kind, &descriptor.target).is_some()
        {
            return None;
        }
        Some(self.create_task(descriptor))
    }

    pub fn find_live(&self, kind: TaskKind, target: &EntityId) -> Option<&TaskRecord> {
        self.tasks
            .values()
            .find(|t| t.kind == kind && &t.target == target && t.state.is_live())
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.values()
    }

    /// Open tasks a `role` in `scope` may take, best first.
    ///
    /// Open means Pending, or InProgress with room left (group tasks being
    /// topped up). Order: priority descending, then `created_at` ascending,
    /// then creation order.
    pub fn list_pending(&self, role: Role, scope: Option<&Scope>) -> Vec<&TaskRecord> {
        let mut open: Vec<&TaskRecord> = self
            .tasks
            .values()
            .filter(|t| t.is_open() && t.accepts(role, scope))
            .collect();
        open.sort_by_key(|t| (Reverse(t.priority), t.created_at, t.seq));
        open
    }

    /// The task `unit` is an assignee of, if any.
    pub fn assignment_of(&self, unit: &UnitId) -> Option<TaskId> {
        self.tasks
            .values()
            .find(|t| t.assignees.contains(unit))
            .map(|t| t.id)
    }

    pub fn bind(&mut self, id: TaskId, unit: &UnitId, role: Role) -> Result<(), BindRejection> {
        let Some(task) = self.tasks.get(&id) else {
            return Err(BindRejection::TaskNotFound);
        };
        if !task.state.is_live() {
            return Err(BindRejection::NotOpen { state: task.state });
        }
        if !task.eligible_roles.contains(&role) {
            return Err(BindRejection::RoleIneligible { role });
        }
        if self.assignment_of(unit).is_some() {
            return Err(BindRejection::AlreadyAssigned);
        }
        if task.assignees.len() as u32 >= task.capacity {
            return Err(BindRejection::CapacityFull {
                capacity: task.capacity,
            });
        }

        if let Some(task) = self.tasks.get_mut(&id) {
            task.add_assignee(unit.clone());
            tracing::debug!(
                task = %id,
                unit = %unit,
                assignees = task.assignees.len(),
                "unit bound"
            );
        }
        Ok(())
    }

    /// Abandonment: the task goes back to Pending once nobody holds it.
    pub fn release(&mut self, id: TaskId, unit: &UnitId) -> Result<(), ColonyError> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(ColonyError::TaskNotFound(id))?;
        task.remove_assignee(unit);
        tracing::debug!(task = %id, unit = %unit, state = ?task.state, "unit released");
        Ok(())
    }

    /// Perpetual tasks restart as Pending, others become Completed.
    ///
    /// Completed and Failed tasks stay as they are.
    pub fn complete(&mut self, id: TaskId) -> Result<(), ColonyError> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(ColonyError::TaskNotFound(id))?;
        if !task.state.is_live() {
            return Err(ColonyError::NotLive {
                task: id,
                state: task.state,
            });
        }
        let decision = if task.perpetual {
            task.reset();
            "reset"
        } else {
            task.mark_completed();
            "complete"
        };
        tracing::info!(task = %id, kind = %task.kind, decision, "task completed");

        let record = DecisionRecord::new(
            id,
            self.tick,
            serde_json::json!({ "perpetual": decision == "reset" }),
            "task_complete",
            decision,
        );
        self.record_decision(record);
        Ok(())
    }

    pub fn fail(&mut self, id: TaskId, reason: impl Into<String>) -> Result<(), ColonyError> {
        let reason = reason.into();
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(ColonyError::TaskNotFound(id))?;
        task.mark_failed(reason.clone());
        tracing::info!(task = %id, kind = %task.kind, reason = %reason, "task failed");

        let record = DecisionRecord::new(
            id,
            self.tick,
            serde_json::json!({ "reason": reason }),
            "invalid_task",
            "fail",
        );
        self.record_decision(record);
        Ok(())
    }

    /// No-op unless the task is InProgress.
    pub fn update_progress(&mut self, id: TaskId, value: u32) -> Result<(), ColonyError> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(ColonyError::TaskNotFound(id))?;
        task.set_progress(value);
        Ok(())
    }

    /// Drop Failed tasks. Runs at the end of every tick.
    pub fn purge_failed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, t| t.state != TaskState::Failed);
        before - self.tasks.len()
    }

    /// Drop Completed and Failed tasks. Runs on a coarse period.
    pub fn sweep_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, t| t.perpetual || !t.state.is_terminal());
        let swept = before - self.tasks.len();
        if swept > 0 {
            tracing::info!(swept, remaining = self.tasks.len(), "completed tasks swept");
        }
        swept
    }

    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in self.tasks.values() {
            match task.state {
                TaskState::Pending => counts.pending += 1,
                TaskState::InProgress => counts.in_progress += 1,
                TaskState::Completed => counts.completed += 1,
                TaskState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Append to the bounded decision journal (oldest entries drop first).
    pub fn record_decision(&mut self, record: DecisionRecord) {
        if self.decision_limit == 0 {
            return;
        }
        while self.decisions.len() >= self.decision_limit {
            self.decisions.pop_front();
        }
        self.decisions.push_back(record);
    }

    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.decisions.iter()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            tasks: self.tasks.values().cloned().collect(),
            next_seq: self.next_seq,
        }
    }

    /// Replace all tasks with the snapshot's. The decision journal is kept.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.tasks = snapshot.tasks.into_iter().map(|t| (t.id, t)).collect();
        self.next_seq = snapshot.next_seq;
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("tick", &self.tick)
            .field("tasks", &self.tasks.len())
            .field("decisions", &self.decisions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use proptest::prelude::*;

    fn build_task(priority: Priority, capacity: u32) -> TaskDescriptor {
        TaskDescriptor::new(TaskKind::Build, EntityId::new(format!("site-{priority:?}")), priority)
            .roles([Role::Builder, Role::Generalist])
            .capacity(capacity)
    }

    fn unit(name: &str) -> UnitId {
        UnitId::from(name)
    }

    #[test]
    fn create_task_sets_defaults() {
        let mut store = TaskStore::in_memory();
        store.set_tick(7);

        let mine = store.create_task(
            TaskDescriptor::new(TaskKind::MineSource, "src-1", Priority::High)
                .roles([Role::Miner])
                .perpetual(),
        );
        let pile = store.create_task(
            TaskDescriptor::new(TaskKind::CollectFromPile, "pile-1", Priority::Medium)
                .roles([Role::Courier]),
        );

        let mine = store.get(mine).unwrap();
        assert_eq!(mine.state, TaskState::Pending);
        assert_eq!(mine.progress, 0);
        assert_eq!(mine.progress_limit, 1000);
        assert_eq!(mine.created_at, 7);
        assert_eq!(store.get(pile).unwrap().progress_limit, 100);
    }

    #[test]
    fn list_pending_orders_by_priority_then_age() {
        let mut store = TaskStore::in_memory();
        for (priority, tick) in [(Priority::Low, 5), (Priority::High, 1), (Priority::Medium, 3)] {
            store.set_tick(tick);
            store.create_task(build_task(priority, 1));
        }

        let order: Vec<(Priority, u64)> = store
            .list_pending(Role::Builder, None)
            .iter()
            .map(|t| (t.priority, t.created_at))
            .collect();

        assert_eq!(
            order,
            vec![(Priority::High, 1), (Priority::Medium, 3), (Priority::Low, 5)]
        );
    }

    #[test]
    fn equal_priority_and_age_fall_back_to_creation_order() {
        let mut store = TaskStore::in_memory();
        let ids: Vec<TaskId> = (0..5)
            .map(|i| {
                store.create_task(
                    TaskDescriptor::new(TaskKind::Repair, EntityId::new(format!("road-{i}")), Priority::Medium)
                        .roles([Role::Repairer]),
                )
            })
            .collect();

        let listed: Vec<TaskId> = store
            .list_pending(Role::Repairer, None)
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn list_pending_filters_role_and_scope() {
        let mut store = TaskStore::in_memory();
        store.create_task(build_task(Priority::High, 1).in_scope("W1N1"));
        store.create_task(
            TaskDescriptor::new(TaskKind::MineSource, "src-1", Priority::High).roles([Role::Miner]),
        );

        let w1 = Scope::from("W1N1");
        let w2 = Scope::from("W2N2");
        assert_eq!(store.list_pending(Role::Builder, Some(&w1)).len(), 1);
        assert!(store.list_pending(Role::Builder, Some(&w2)).is_empty());
        assert_eq!(store.list_pending(Role::Miner, Some(&w2)).len(), 1);
    }

    #[test]
    fn bind_rejections() {
        let mut store = TaskStore::in_memory();
        let single = store.create_task(build_task(Priority::High, 1));
        let other = store.create_task(build_task(Priority::Low, 1));

        assert_eq!(
            store.bind(single, &unit("m1"), Role::Miner),
            Err(BindRejection::RoleIneligible { role: Role::Miner })
        );
        assert_eq!(store.bind(single, &unit("b1"), Role::Builder), Ok(()));
        assert_eq!(
            store.bind(single, &unit("b2"), Role::Builder),
            Err(BindRejection::CapacityFull { capacity: 1 })
        );
        assert_eq!(
            store.bind(other, &unit("b1"), Role::Builder),
            Err(BindRejection::AlreadyAssigned)
        );

        store.fail(other, "gone").unwrap();
        assert_eq!(
            store.bind(other, &unit("b2"), Role::Builder),
            Err(BindRejection::NotOpen {
                state: TaskState::Failed
            })
        );

        let missing = TaskId::from_ulid(ulid::Ulid::new());
        assert_eq!(
            store.bind(missing, &unit("b2"), Role::Builder),
            Err(BindRejection::TaskNotFound)
        );
    }

    #[test]
    fn group_task_stays_in_progress_until_last_release() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(build_task(Priority::Medium, 2));

        store.bind(id, &unit("b1"), Role::Builder).unwrap();
        store.bind(id, &unit("b2"), Role::Generalist).unwrap();
        assert_eq!(store.get(id).unwrap().assignees.len(), 2);

        store.release(id, &unit("b1")).unwrap();
        let task = store.get(id).unwrap();
        assert_eq!(task.assignees.len(), 1);
        assert_eq!(task.state, TaskState::InProgress);

        store.release(id, &unit("b2")).unwrap();
        assert_eq!(store.get(id).unwrap().state, TaskState::Pending);
    }

    #[test]
    fn perpetual_completion_looks_like_a_fresh_task() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(
            TaskDescriptor::new(TaskKind::MineSource, "src-1", Priority::High)
                .roles([Role::Miner])
                .perpetual(),
        );
        let fresh = store.get(id).unwrap().clone();

        store.bind(id, &unit("m1"), Role::Miner).unwrap();
        store.update_progress(id, 40).unwrap();
        store.complete(id).unwrap();

        assert_eq!(store.get(id).unwrap(), &fresh);
        assert_eq!(store.sweep_completed(), 0);
        assert!(store.get(id).is_some());
    }

    #[test]
    fn non_perpetual_completion_disappears_after_sweep() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(build_task(Priority::Medium, 1));
        store.bind(id, &unit("b1"), Role::Builder).unwrap();

        store.complete(id).unwrap();
        let task = store.get(id).unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert!(task.assignees.is_empty());
        assert_eq!(store.purge_failed(), 0);

        assert_eq!(store.sweep_completed(), 1);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn failed_tasks_are_purged() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(build_task(Priority::Medium, 1));
        store.bind(id, &unit("b1"), Role::Builder).unwrap();

        store.fail(id, "target destroyed").unwrap();
        assert_eq!(store.counts().failed, 1);
        assert_eq!(store.get(id).unwrap().last_error.as_deref(), Some("target destroyed"));

        assert_eq!(store.purge_failed(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn create_unique_ignores_live_duplicates() {
        let mut store = TaskStore::in_memory();
        let first = store.create_unique(build_task(Priority::Medium, 1));
        assert!(first.is_some());
        assert!(store.create_unique(build_task(Priority::Medium, 1)).is_none());

        store.fail(first.unwrap(), "x").unwrap();
        store.purge_failed();
        assert!(store.create_unique(build_task(Priority::Medium, 1)).is_some());
    }

    #[test]
    fn unknown_task_is_an_error() {
        let mut store = TaskStore::in_memory();
        let missing = TaskId::from_ulid(ulid::Ulid::new());
        assert!(matches!(
            store.complete(missing),
            Err(ColonyError::TaskNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn complete_leaves_failed_perpetual_task_failed() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(build_task(Priority::High, 1).perpetual());
        store.bind(id, &unit("b1"), Role::Builder).unwrap();
        store.fail(id, "target gone").unwrap();

        let result = store.complete(id);

        assert!(matches!(
            result,
            Err(ColonyError::NotLive { task, state: TaskState::Failed }) if task == id
        ));
        assert_eq!(store.get(id).unwrap().state, TaskState::Failed);
        assert_eq!(store.purge_failed(), 1);
    }

    #[test]
    fn completing_twice_is_rejected() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(build_task(Priority::High, 1));
        store.complete(id).unwrap();

        assert!(matches!(store.complete(id), Err(ColonyError::NotLive { .. })));
        assert_eq!(
            store.decisions().filter(|d| d.policy == "task_complete").count(),
            1
        );
    }

    #[test]
    fn decision_journal_is_bounded() {
        let mut store = TaskStore::new(
            Box::new(UlidGenerator::new(SystemClock)),
            ProgressLimits::default(),
            2,
        );
        let id = store.create_task(build_task(Priority::Medium, 1).perpetual());
        for _ in 0..3 {
            store.bind(id, &unit("b1"), Role::Builder).ok();
            store.complete(id).unwrap();
        }
        store.fail(id, "last").unwrap();

        let decisions: Vec<&str> = store.decisions().map(|d| d.decision.as_str()).collect();
        assert_eq!(decisions, vec!["reset", "fail"]);
    }

    #[test]
    fn snapshot_restores_tasks_verbatim() {
        let mut store = TaskStore::in_memory();
        let id = store.create_task(build_task(Priority::High, 2));
        store.bind(id, &unit("b1"), Role::Builder).unwrap();
        store.update_progress(id, 12).unwrap();

        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let mut restored = TaskStore::in_memory();
        restored.restore(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.get(id), store.get(id));
        let next = restored.create_task(build_task(Priority::Low, 1));
        assert_eq!(restored.get(next).unwrap().seq, 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create { capacity: u32, perpetual: bool },
        Bind { task: usize, unit: usize },
        Release { task: usize, unit: usize },
        Complete { task: usize },
        Fail { task: usize },
        Progress { task: usize, value: u32 },
        Purge,
        Sweep,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..4, any::<bool>()).prop_map(|(capacity, perpetual)| Op::Create { capacity, perpetual }),
            (0usize..8, 0usize..6).prop_map(|(task, unit)| Op::Bind { task, unit }),
            (0usize..8, 0usize..6).prop_map(|(task, unit)| Op::Release { task, unit }),
            (0usize..8).prop_map(|task| Op::Complete { task }),
            (0usize..8).prop_map(|task| Op::Fail { task }),
            (0usize..8, 0u32..2000).prop_map(|(task, value)| Op::Progress { task, value }),
            Just(Op::Purge),
            Just(Op::Sweep),
        ]
    }

    fn assert_invariants(store: &TaskStore) {
        let mut seen = std::collections::BTreeSet::new();
        for t in store.tasks() {
            assert!(t.assignees.len() as u32 <= t.capacity);
            assert!(t.progress <= t.progress_limit);
            match t.state {
                TaskState::InProgress => assert!(!t.assignees.is_empty()),
                _ => assert!(t.assignees.is_empty()),
            }
            for u in &t.assignees {
                assert!(seen.insert(u.clone()), "{u} bound twice");
            }
        }
    }

    proptest! {
        #[test]
        fn prop_store_invariants_hold_after_every_operation(ops in prop::collection::vec(op(), 1..60)) {
            let mut store = TaskStore::in_memory();
            let mut ids: Vec<TaskId> = Vec::new();
            let units: Vec<UnitId> = (0..6).map(|i| UnitId::new(format!("u{i}"))).collect();
            let mut failed: Vec<TaskId> = Vec::new();

            for (i, op) in ops.into_iter().enumerate() {
                store.set_tick(i as u64);
                let pick = |idx: usize| ids.get(idx % ids.len().max(1)).copied();
                match op {
                    Op::Create { capacity, perpetual } => {
                        let mut d = TaskDescriptor::new(
                            TaskKind::Build,
                            EntityId::new(format!("site-{i}")),
                            Priority::Medium,
                        )
                        .roles([Role::Builder])
                        .capacity(capacity);
                        d.perpetual = perpetual;
                        ids.push(store.create_task(d));
                    }
                    Op::Bind { task, unit } => {
                        if let Some(id) = pick(task) {
                            let _ = store.bind(id, &units[unit], Role::Builder);
                        }
                    }
                    Op::Release { task, unit } => {
                        if let Some(id) = pick(task) {
                            let _ = store.release(id, &units[unit]);
                        }
                    }
                    Op::Complete { task } => {
                        if let Some(id) = pick(task) {
                            let _ = store.complete(id);
                        }
                    }
                    Op::Fail { task } => {
                        if let Some(id) = pick(task) {
                            if store.fail(id, "random").is_ok() {
                                failed.push(id);
                            }
                        }
                    }
                    Op::Progress { task, value } => {
                        if let Some(id) = pick(task) {
                            let _ = store.update_progress(id, value);
                        }
                    }
                    Op::Purge => {
                        store.purge_failed();
                    }
                    Op::Sweep => {
                        store.sweep_completed();
                    }
                }
                assert_invariants(&store);
                for id in &failed {
                    prop_assert!(store.get(*id).is_none_or(|t| t.state == TaskState::Failed));
                }
            }
        }
    }
}
