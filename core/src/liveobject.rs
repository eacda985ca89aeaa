use std::sync::{Arc, Mutex, Weak};

use ankql::ast::Selection;
use tracing::{debug, warn};

use crate::changes::{ChangeKind, ChangeKindSet};
use crate::collection::CollectionId;
use crate::error::{ErrorCallback, RetrievalError};
use crate::id::EntityId;
use crate::registry::{ChangeRegistry, ObserverId};
use crate::store::{Entity, Prefetch, Store};

type ObjectCallback<E> = Box<dyn Fn(Option<&E>, &ChangeKindSet) + Send + Sync>;

/// Observes a single entity chosen by a selection at construction time.
///
/// Cloneable handle around a shared inner; the registry holds only a `Weak`
/// reference, and dropping the last handle unsubscribes. The callback
/// receives the current value (`None` after deletion) and the kind that
/// triggered the refresh; the empty set marks the initial delivery.
pub struct LiveObject<S: Store>(pub(crate) Arc<LiveObjectInner<S>>);

impl<S: Store> Clone for LiveObject<S> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

pub(crate) struct LiveObjectInner<S: Store> {
    id: ObserverId,
    /// Identity bound at construction. `None` means the selection matched
    /// nothing - the observer stays unbound and silent for its lifetime.
    tracked: Option<EntityId>,
    store: Weak<S>,
    registry: Weak<ChangeRegistry<S>>,
    last_value: Mutex<Option<S::Entity>>,
    on_change: ObjectCallback<S::Entity>,
    on_error: ErrorCallback,
}

impl<S: Store> LiveObject<S> {
    /// Fetch errors go to `warn!` and are otherwise dropped; use
    /// [`with_error_handler`](Self::with_error_handler) to observe them.
    pub fn new(
        store: &Arc<S>,
        registry: &Arc<ChangeRegistry<S>>,
        collection: impl Into<CollectionId>,
        selection: Selection,
        prefetch: Prefetch,
        on_change: impl Fn(Option<&S::Entity>, &ChangeKindSet) + Send + Sync + 'static,
    ) -> Result<Self, RetrievalError> {
        Self::with_error_handler(store, registry, collection, selection, prefetch, on_change, |error| {
            warn!("live object refresh failed: {}", error)
        })
    }

    /// Resolves the selection once. More than one match fails with
    /// [`RetrievalError::Ambiguous`]; exactly one binds the observer to that
    /// identity, subscribes it, and delivers the value immediately; zero
    /// matches yields an unbound observer that never subscribes and never
    /// fires. The bound identity is fixed for the observer's lifetime.
    pub fn with_error_handler(
        store: &Arc<S>,
        registry: &Arc<ChangeRegistry<S>>,
        collection: impl Into<CollectionId>,
        selection: Selection,
        prefetch: Prefetch,
        on_change: impl Fn(Option<&S::Entity>, &ChangeKindSet) + Send + Sync + 'static,
        on_error: impl Fn(RetrievalError) + Send + Sync + 'static,
    ) -> Result<Self, RetrievalError> {
        let collection = collection.into();
        let initial = store.fetch_one(&collection, &selection, &prefetch)?;
        let tracked = initial.as_ref().map(|entity| entity.id());
        let initial_value = initial.clone();

        let handle = LiveObject(Arc::new(LiveObjectInner {
            id: registry.next_observer_id(),
            tracked,
            store: Arc::downgrade(store),
            registry: Arc::downgrade(registry),
            last_value: Mutex::new(initial),
            on_change: Box::new(on_change),
            on_error: Box::new(on_error),
        }));

        if let Some(entity_id) = tracked {
            registry.subscribe_object(entity_id, &handle);
            debug!("live object {} bound to {}/{:#}", handle.0.id, collection, entity_id);
            (handle.0.on_change)(initial_value.as_ref(), &ChangeKindSet::default());
        } else {
            debug!("live object {} unbound, no match in {}", handle.0.id, collection);
        }
        Ok(handle)
    }

    /// Last successfully fetched value. Survives refresh errors unchanged.
    pub fn value(&self) -> Option<S::Entity> { self.0.last_value.lock().unwrap().clone() }

    pub fn entity_id(&self) -> Option<EntityId> { self.0.tracked }

    pub fn is_bound(&self) -> bool { self.0.tracked.is_some() }

    pub fn observer_id(&self) -> ObserverId { self.0.id }
}

impl<S: Store> LiveObjectInner<S> {
    /// Registry-invoked. Re-fetches by the bound id only; the construction
    /// prefetch is not reapplied on refresh.
    pub(crate) fn changed(&self, kind: ChangeKind) {
        let Some(entity_id) = self.tracked else { return };
        let Some(store) = self.store.upgrade() else {
            (self.on_error)(RetrievalError::NoContext);
            return;
        };
        match store.fetch_by_id(&entity_id) {
            Ok(fresh) => {
                {
                    *self.last_value.lock().unwrap() = fresh.clone();
                }
                (self.on_change)(fresh.as_ref(), &ChangeKindSet::from(kind));
            }
            // last_value keeps the previous good value
            Err(error) => (self.on_error)(error),
        }
    }
}

impl<S: Store> Drop for LiveObjectInner<S> {
    fn drop(&mut self) {
        if let (Some(entity_id), Some(registry)) = (self.tracked, self.registry.upgrade()) {
            registry.unsubscribe_object(&entity_id, self.id);
        }
    }
}
