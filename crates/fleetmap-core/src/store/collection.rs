// ── Generic reactive entity collection ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::EntityId;

/// A reactive collection for a single entity type, keyed by `EntityId`.
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive. Snapshots are ordered by id so renders are stable.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    by_id: DashMap<EntityId, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, id: EntityId, entity: T) -> bool {
        let is_new = self.by_id.insert(id, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Replace the whole contents in one step: upsert every entry, drop
    /// every id not present. Subscribers see a single change.
    pub(crate) fn replace_all(&self, entries: Vec<(EntityId, T)>) {
        let incoming: std::collections::HashSet<EntityId> =
            entries.iter().map(|(id, _)| id.clone()).collect();
        self.by_id.retain(|id, _| incoming.contains(id));
        for (id, entity) in entries {
            self.by_id.insert(id, Arc::new(entity));
        }
        self.rebuild_snapshot();
        self.bump_version();
    }

    pub(crate) fn get(&self, id: &EntityId) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values into a snapshot vec and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(EntityId, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_reports_new_ids() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(col.upsert(EntityId::from("a"), "hello".into()));
        assert!(!col.upsert(EntityId::from("a"), "world".into()));
        assert_eq!(*col.get(&EntityId::from("a")).unwrap(), "world");
        assert_eq!(col.version(), 2);
    }

    #[test]
    fn replace_all_prunes_missing_ids() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert(EntityId::from("a"), "x".into());
        col.upsert(EntityId::from("b"), "y".into());

        col.replace_all(vec![
            (EntityId::from("b"), "y2".into()),
            (EntityId::from("c"), "z".into()),
        ]);

        assert_eq!(col.len(), 2);
        assert!(col.get(&EntityId::from("a")).is_none());
        assert_eq!(*col.get(&EntityId::from("b")).unwrap(), "y2");
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.upsert(EntityId::from("b"), "second".into());
        col.upsert(EntityId::from("a"), "first".into());

        let snap = col.snapshot();
        assert_eq!(*snap[0], "first");
        assert_eq!(*snap[1], "second");
    }
}
