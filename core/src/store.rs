use ankql::ast::Selection;

use crate::{collection::CollectionId, error::RetrievalError, id::EntityId};

/// A stored value the engine can observe. Equality is used for result
/// diffing, so it must cover everything a subscriber would consider a change.
pub trait Entity: Clone + PartialEq + Send + Sync + 'static {
    fn id(&self) -> EntityId;
    fn collection(&self) -> &CollectionId;
}

/// Relation key paths to resolve eagerly during a fetch. Opaque to the
/// engine - it is handed to the store verbatim.
#[derive(Debug, Clone, Default)]
pub struct Prefetch(Vec<String>);

impl Prefetch {
    pub fn none() -> Self { Self(Vec::new()) }

    pub fn key_paths(&self) -> &[String] { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<String>> for Prefetch {
    fn from(key_paths: Vec<String>) -> Self { Self(key_paths) }
}

/// The storage collaborator. Predicate matching, ordering, and limits are the
/// store's job; the engine only hands it the selection and reads back results.
///
/// Contract: after each atomic mutation the store calls
/// [`ChangeRegistry::notify_change`](crate::registry::ChangeRegistry::notify_change)
/// before returning to the mutator, so that observers re-fetching on
/// notification see post-mutation state.
pub trait Store: Send + Sync + 'static {
    type Entity: Entity;

    /// All entities in `collection` matching `selection`, ordered per its
    /// ORDER BY clause. A selection carries no collection scope of its own.
    fn fetch_many(&self, collection: &CollectionId, selection: &Selection, prefetch: &Prefetch) -> Result<Vec<Self::Entity>, RetrievalError>;

    fn fetch_by_id(&self, entity_id: &EntityId) -> Result<Option<Self::Entity>, RetrievalError>;

    /// At-most-one lookup. Zero matches is `None`; more than one match is an
    /// error carrying the matched ids, never a silent arbitrary pick.
    fn fetch_one(&self, collection: &CollectionId, selection: &Selection, prefetch: &Prefetch) -> Result<Option<Self::Entity>, RetrievalError> {
        let mut matches = self.fetch_many(collection, selection, prefetch)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            _ => Err(RetrievalError::Ambiguous(matches.iter().map(|entity| entity.id()).collect())),
        }
    }

    fn get(&self, entity_id: &EntityId) -> Result<Self::Entity, RetrievalError> {
        self.fetch_by_id(entity_id)?.ok_or(RetrievalError::NotFound(*entity_id))
    }

    fn count(&self, collection: &CollectionId, selection: &Selection) -> Result<usize, RetrievalError> {
        Ok(self.fetch_many(collection, selection, &Prefetch::none())?.len())
    }
}
