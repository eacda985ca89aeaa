//! Reactive observation layer over a persistent object store.
//!
//! Applications register selection-based observers - [`LiveObject`] for a
//! single entity, [`LiveQuery`] for a result set - against a store reached
//! through the [`Store`] trait. The store reports each atomic mutation as a
//! [`ChangeBatch`] to the [`ChangeRegistry`], which routes it to the affected
//! observers; they re-fetch, diff, and push fresh values to their callbacks.

pub mod changes;
pub mod collection;
pub mod error;
pub mod id;
pub mod liveobject;
pub mod livequery;
pub mod registry;
pub mod store;

pub use ankql;

pub use changes::{ChangeBatch, ChangeEvent, ChangeKind, ChangeKindSet};
pub use collection::CollectionId;
pub use error::{DecodeError, RetrievalError};
pub use id::EntityId;
pub use liveobject::LiveObject;
pub use livequery::LiveQuery;
pub use registry::{ChangeRegistry, ObserverId};
pub use store::{Entity, Prefetch, Store};
