use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{collection::CollectionId, id::EntityId};

/// What happened to an entity. Tag only, carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Refresh,
    Invalidate,
}

impl ChangeKind {
    /// Delivery order within a batch. Inserts land before updates, updates
    /// before deletes, and the cache-coherence kinds come last.
    pub const PRIORITY: [ChangeKind; 5] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete, ChangeKind::Refresh, ChangeKind::Invalidate];

    fn bit(self) -> u8 {
        match self {
            ChangeKind::Insert => 1 << 0,
            ChangeKind::Update => 1 << 1,
            ChangeKind::Delete => 1 << 2,
            ChangeKind::Refresh => 1 << 3,
            ChangeKind::Invalidate => 1 << 4,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "insert"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
            ChangeKind::Refresh => write!(f, "refresh"),
            ChangeKind::Invalidate => write!(f, "invalidate"),
        }
    }
}

/// Set of distinct [`ChangeKind`]s. A collection observer receives one of
/// these per batch - the union of every kind that touched its collection.
/// The empty set marks an observer's initial delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeKindSet(u8);

impl ChangeKindSet {
    pub fn insert(&mut self, kind: ChangeKind) { self.0 |= kind.bit() }

    pub fn contains(&self, kind: ChangeKind) -> bool { self.0 & kind.bit() != 0 }

    pub fn union(self, other: ChangeKindSet) -> ChangeKindSet { ChangeKindSet(self.0 | other.0) }

    pub fn is_empty(&self) -> bool { self.0 == 0 }

    pub fn len(&self) -> usize { self.0.count_ones() as usize }

    /// Iterates in priority order regardless of insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ChangeKind> + '_ { ChangeKind::PRIORITY.into_iter().filter(|kind| self.contains(*kind)) }
}

impl From<ChangeKind> for ChangeKindSet {
    fn from(kind: ChangeKind) -> Self {
        let mut set = ChangeKindSet::default();
        set.insert(kind);
        set
    }
}

impl FromIterator<ChangeKind> for ChangeKindSet {
    fn from_iter<I: IntoIterator<Item = ChangeKind>>(iter: I) -> Self {
        let mut set = ChangeKindSet::default();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Display for ChangeKindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "initial");
        }
        for (i, kind) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", kind)?;
        }
        Ok(())
    }
}

/// One entity-level change within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: EntityId,
    pub collection: CollectionId,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(entity_id: EntityId, collection: impl Into<CollectionId>, kind: ChangeKind) -> Self {
        Self { entity_id, collection: collection.into(), kind }
    }
}

/// All changes produced by one atomic mutation of the store, in the order the
/// store applied them.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    pub fn new(events: Vec<ChangeEvent>) -> Self { Self { events } }

    pub fn single(event: ChangeEvent) -> Self { Self { events: vec![event] } }

    pub fn push(&mut self, event: ChangeEvent) { self.events.push(event) }

    pub fn events(&self) -> &[ChangeEvent] { &self.events }

    pub fn len(&self) -> usize { self.events.len() }

    pub fn is_empty(&self) -> bool { self.events.is_empty() }
}
