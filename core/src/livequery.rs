use std::sync::{Arc, Mutex, Weak};

use ankql::ast::Selection;
use tracing::{debug, warn};

use crate::changes::ChangeKindSet;
use crate::collection::CollectionId;
use crate::error::{ErrorCallback, RetrievalError};
use crate::registry::{ChangeRegistry, ObserverId};
use crate::store::{Entity, Prefetch, Store};

type ResultCallback<E> = Box<dyn Fn(&[E], &ChangeKindSet) + Send + Sync>;

/// Observes the full result set of a selection over one collection.
///
/// Subscribed for its whole lifetime, including when the result is empty - a
/// list query must react to inserts. Re-fetches on every relevant batch and
/// suppresses deliveries whose result is element-wise identical (same
/// identities, same values, same order) to the last one.
pub struct LiveQuery<S: Store>(pub(crate) Arc<LiveQueryInner<S>>);

impl<S: Store> Clone for LiveQuery<S> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

pub(crate) struct LiveQueryInner<S: Store> {
    id: ObserverId,
    collection: CollectionId,
    selection: Selection,
    prefetch: Prefetch,
    store: Weak<S>,
    registry: Weak<ChangeRegistry<S>>,
    last_result: Mutex<Vec<S::Entity>>,
    on_change: ResultCallback<S::Entity>,
    on_error: ErrorCallback,
}

impl<S: Store> LiveQuery<S> {
    /// Fetch errors go to `warn!` and are otherwise dropped; use
    /// [`with_error_handler`](Self::with_error_handler) to observe them.
    pub fn new(
        store: &Arc<S>,
        registry: &Arc<ChangeRegistry<S>>,
        collection: impl Into<CollectionId>,
        selection: Selection,
        prefetch: Prefetch,
        on_change: impl Fn(&[S::Entity], &ChangeKindSet) + Send + Sync + 'static,
    ) -> Result<Self, RetrievalError> {
        Self::with_error_handler(store, registry, collection, selection, prefetch, on_change, |error| {
            warn!("live query refresh failed: {}", error)
        })
    }

    /// Runs the query eagerly - a fetch error fails construction outright,
    /// there is no partially constructed observer. The initial result is
    /// delivered immediately, empty included (empty-but-valid is a real
    /// result, distinct from an error).
    pub fn with_error_handler(
        store: &Arc<S>,
        registry: &Arc<ChangeRegistry<S>>,
        collection: impl Into<CollectionId>,
        selection: Selection,
        prefetch: Prefetch,
        on_change: impl Fn(&[S::Entity], &ChangeKindSet) + Send + Sync + 'static,
        on_error: impl Fn(RetrievalError) + Send + Sync + 'static,
    ) -> Result<Self, RetrievalError> {
        let collection = collection.into();
        let initial = store.fetch_many(&collection, &selection, &prefetch)?;

        let handle = LiveQuery(Arc::new(LiveQueryInner {
            id: registry.next_observer_id(),
            collection: collection.clone(),
            selection,
            prefetch,
            store: Arc::downgrade(store),
            registry: Arc::downgrade(registry),
            last_result: Mutex::new(initial.clone()),
            on_change: Box::new(on_change),
            on_error: Box::new(on_error),
        }));

        registry.subscribe_collection(collection, &handle);
        debug!("live query {} watching {} with {} initial entities", handle.0.id, handle.0.collection, initial.len());
        (handle.0.on_change)(&initial, &ChangeKindSet::default());
        Ok(handle)
    }

    /// Last successfully fetched result set. Survives refresh errors
    /// unchanged, so the next successful refresh diffs against known-good
    /// state.
    pub fn results(&self) -> Vec<S::Entity> { self.0.last_result.lock().unwrap().clone() }

    pub fn collection(&self) -> &CollectionId { &self.0.collection }

    pub fn selection(&self) -> &Selection { &self.0.selection }

    pub fn observer_id(&self) -> ObserverId { self.0.id }
}

impl<S: Store> LiveQueryInner<S> {
    /// Registry-invoked, once per relevant batch with the union of its kinds.
    pub(crate) fn changed(&self, kinds: &ChangeKindSet) {
        let Some(store) = self.store.upgrade() else {
            (self.on_error)(RetrievalError::NoContext);
            return;
        };
        match store.fetch_many(&self.collection, &self.selection, &self.prefetch) {
            Ok(fresh) => {
                {
                    let mut last = self.last_result.lock().unwrap();
                    if same_result(&last, &fresh) {
                        debug!("live query {} result unchanged by {} on {}", self.id, kinds, self.collection);
                        return;
                    }
                    *last = fresh.clone();
                }
                // callback runs outside the result lock
                (self.on_change)(&fresh, kinds);
            }
            // last_result keeps the previous good result
            Err(error) => (self.on_error)(error),
        }
    }
}

/// Identity and value sensitive, in order. A pure reorder or a same-valued
/// entity under a new identity both count as changes.
fn same_result<E: Entity>(last: &[E], fresh: &[E]) -> bool {
    last.len() == fresh.len() && last.iter().zip(fresh).all(|(a, b)| a.id() == b.id() && a == b)
}

impl<S: Store> Drop for LiveQueryInner<S> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe_collection(&self.collection, self.id);
        }
    }
}
