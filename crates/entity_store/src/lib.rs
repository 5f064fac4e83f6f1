//! Ownership-tracked entity table.
//!
//! Entities are stored behind opaque [`EntityId`]s and are either
//! available or consumed. Consumption is all-or-nothing across every
//! entity named in a single [`EntityStore::try_consume`] call, which is
//! what lets a composite be built out of several parts without any part
//! being observed half-used.

mod error;
mod id;
mod store;

pub use error::StoreError;
pub use id::EntityId;
pub use store::{Entity, EntityStore};
