use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::changes::{ChangeBatch, ChangeKind, ChangeKindSet};
use crate::collection::CollectionId;
use crate::id::EntityId;
use crate::liveobject::{LiveObject, LiveObjectInner};
use crate::livequery::{LiveQuery, LiveQueryInner};
use crate::store::Store;

/// Registry-scoped observer identity, monotonic per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "o{}", self.0) }
}

struct Watcher<T> {
    id: ObserverId,
    observer: Weak<T>,
}

/// Routes change batches from the store to the observers that care.
///
/// Holds only `Weak` references - observer lifetime belongs to the handles,
/// and a dropped observer unsubscribes itself. Explicitly constructed and
/// owned by the application root; there is no process-wide instance.
pub struct ChangeRegistry<S: Store> {
    inner: Mutex<RegistryInner<S>>,
    next_observer_id: AtomicUsize,
}

struct RegistryInner<S: Store> {
    object_watchers: HashMap<EntityId, Vec<Watcher<LiveObjectInner<S>>>>,
    collection_watchers: HashMap<CollectionId, Vec<Watcher<LiveQueryInner<S>>>>,
}

impl<S: Store> ChangeRegistry<S> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RegistryInner { object_watchers: HashMap::new(), collection_watchers: HashMap::new() }),
            next_observer_id: AtomicUsize::new(0),
        })
    }

    pub(crate) fn next_observer_id(&self) -> ObserverId { ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed)) }

    /// Idempotent - re-subscribing an already-watching observer is a no-op,
    /// so an entity never notifies the same observer twice per event.
    pub fn subscribe_object(&self, entity_id: EntityId, observer: &LiveObject<S>) {
        let mut inner = self.inner.lock().unwrap();
        let watchers = inner.object_watchers.entry(entity_id).or_default();
        if watchers.iter().any(|w| w.id == observer.observer_id()) {
            return;
        }
        debug!("registry: {} watching entity {:#}", observer.observer_id(), entity_id);
        watchers.push(Watcher { id: observer.observer_id(), observer: Arc::downgrade(&observer.0) });
    }

    /// No-op when the observer is not subscribed. Removes the map entry when
    /// the watcher list empties so no empty-key entries persist.
    pub fn unsubscribe_object(&self, entity_id: &EntityId, observer_id: ObserverId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(watchers) = inner.object_watchers.get_mut(entity_id) {
            watchers.retain(|w| w.id != observer_id);
            if watchers.is_empty() {
                inner.object_watchers.remove(entity_id);
            }
        }
    }

    pub fn subscribe_collection(&self, collection: CollectionId, observer: &LiveQuery<S>) {
        let mut inner = self.inner.lock().unwrap();
        let watchers = inner.collection_watchers.entry(collection).or_default();
        if watchers.iter().any(|w| w.id == observer.observer_id()) {
            return;
        }
        watchers.push(Watcher { id: observer.observer_id(), observer: Arc::downgrade(&observer.0) });
    }

    pub fn unsubscribe_collection(&self, collection: &CollectionId, observer_id: ObserverId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(watchers) = inner.collection_watchers.get_mut(collection) {
            watchers.retain(|w| w.id != observer_id);
            if watchers.is_empty() {
                inner.collection_watchers.remove(collection);
            }
        }
    }

    /// Routes one batch. Walks the batch once per [`ChangeKind`] in priority
    /// order, delivering to each touched entity's object watchers per event
    /// and accumulating one union [`ChangeKindSet`] per touched collection,
    /// so each collection watcher hears from a batch exactly once. All object
    /// deliveries precede all collection deliveries.
    ///
    /// Watchers are upgraded and snapshotted under the lock but called after
    /// it is released, so a callback may construct or drop observers, and a
    /// notification can never reach a freed observer.
    pub fn notify_change(&self, batch: &ChangeBatch) {
        if batch.is_empty() {
            return;
        }

        let mut object_notifies: Vec<(Arc<LiveObjectInner<S>>, ChangeKind)> = Vec::new();
        let mut collection_kinds: HashMap<CollectionId, ChangeKindSet> = HashMap::new();
        let mut collection_order: Vec<CollectionId> = Vec::new();
        let mut collection_notifies: Vec<(Arc<LiveQueryInner<S>>, ChangeKindSet)> = Vec::new();

        {
            let mut inner = self.inner.lock().unwrap();
            for kind in ChangeKind::PRIORITY {
                for event in batch.events().iter().filter(|e| e.kind == kind) {
                    for observer in upgrade_watchers(&mut inner.object_watchers, &event.entity_id) {
                        object_notifies.push((observer, kind));
                    }
                    let kinds = collection_kinds.entry(event.collection.clone()).or_insert_with(|| {
                        collection_order.push(event.collection.clone());
                        ChangeKindSet::default()
                    });
                    kinds.insert(kind);
                }
            }
            for collection in &collection_order {
                let kinds = collection_kinds[collection];
                for observer in upgrade_watchers(&mut inner.collection_watchers, collection) {
                    collection_notifies.push((observer, kinds));
                }
            }
        }

        debug!(
            "registry: batch of {} events -> {} object and {} collection deliveries",
            batch.len(),
            object_notifies.len(),
            collection_notifies.len()
        );

        for (observer, kind) in object_notifies {
            observer.changed(kind);
        }
        for (observer, kinds) in collection_notifies {
            observer.changed(&kinds);
        }
    }

    /// Live watcher count for an entity key, `None` once the key is gone.
    /// Diagnostic surface, mostly useful in tests.
    pub fn object_watcher_count(&self, entity_id: &EntityId) -> Option<usize> {
        self.inner.lock().unwrap().object_watchers.get(entity_id).map(|watchers| watchers.len())
    }

    pub fn collection_watcher_count(&self, collection: &CollectionId) -> Option<usize> {
        self.inner.lock().unwrap().collection_watchers.get(collection).map(|watchers| watchers.len())
    }
}

/// Upgrades a key's watchers, pruning dead ones and the key itself when the
/// list empties.
fn upgrade_watchers<K, T>(map: &mut HashMap<K, Vec<Watcher<T>>>, key: &K) -> Vec<Arc<T>>
where K: Eq + Hash {
    let Some(watchers) = map.get_mut(key) else {
        return Vec::new();
    };
    let mut strong = Vec::with_capacity(watchers.len());
    watchers.retain(|w| match w.observer.upgrade() {
        Some(observer) => {
            strong.push(observer);
            true
        }
        None => false,
    });
    if watchers.is_empty() {
        map.remove(key);
    }
    strong
}
