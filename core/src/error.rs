use crate::{collection::CollectionId, id::EntityId};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Invalid length")]
    InvalidLength,
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("No store context available")]
    NoContext,
    #[error("Collection {0} is not queryable")]
    InvalidCollection(CollectionId),
    #[error("Malformed entity id: {0}")]
    MalformedId(#[from] DecodeError),
    #[error("Entity {0:?} not found")]
    NotFound(EntityId),
    #[error("Ambiguous result: {} entities matched", .0.len())]
    Ambiguous(Vec<EntityId>),
    #[error("Storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl RetrievalError {
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self { Self::Storage(Box::new(err)) }
}

pub(crate) type ErrorCallback = Box<dyn Fn(RetrievalError) + Send + Sync>;
