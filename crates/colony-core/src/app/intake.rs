//! Discovery intake: descriptors in, deduplicated tasks out.

use std::collections::HashSet;

use crate::domain::{EntityId, TaskDescriptor, TaskKind};
use crate::store::TaskStore;

/// Create a task for every descriptor whose `(kind, target)` has no live task.
///
/// Duplicates inside the batch are dropped too. Production orders are not
/// keyed by target and always go through. Returns how many tasks were
/// created.
pub fn ingest(store: &mut TaskStore, descriptors: impl IntoIterator<Item = TaskDescriptor>) -> usize {
    let mut seen: HashSet<(TaskKind, EntityId)> = HashSet::new();
    let mut created = 0;
    for descriptor in descriptors {
        if descriptor.kind.is_target_scoped()
            && !seen.insert((descriptor.kind, descriptor.target.clone()))
        {
            continue;
        }
        if store.create_unique(descriptor).is_some() {
            created += 1;
        }
    }
    if created > 0 {
        tracing::debug!(created, total = store.len(), "discovery ingested");
    }
    created
}
