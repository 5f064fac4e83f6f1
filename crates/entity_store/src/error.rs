use thiserror::Error;

use crate::id::EntityId;

/// Errors returned by the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A consume request named an entity that is missing, already
    /// consumed, of another kind, or listed twice. Nothing was consumed.
    #[error("{kind} '{id}' cannot be consumed")]
    Conflict { id: EntityId, kind: String },

    /// The entity is missing, consumed, or of another kind.
    #[error("{kind} '{id}' is not available")]
    Unavailable { id: EntityId, kind: String },

    /// The table itself could not be accessed.
    #[error("entity store failure: {0}")]
    Internal(String),
}
