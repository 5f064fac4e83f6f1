use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;
use crate::id::EntityId;

/// A value that can be kept in an [`EntityStore`].
pub trait Entity: Send + Sync + 'static {
    /// Discriminant used to check that an id refers to the expected kind
    /// of entity.
    type Kind: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

enum Slot<E: Entity> {
    Available(E),
    Consumed,
}

type Table<E> = HashMap<EntityId, Slot<E>, ahash::RandomState>;

/// Tracks entities and whether they are still available.
///
/// Every mutation goes through one lock over one table, so a consume
/// spanning several entities is a single indivisible step. Readers see a
/// record either before or after a consume, never in between.
pub struct EntityStore<E: Entity> {
    records: RwLock<Table<E>>,
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table<E>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Internal("entity table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table<E>>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Internal("entity table lock poisoned".to_string()))
    }

    /// Store a new entity as available and return its fresh id.
    pub fn insert(&self, entity: E) -> Result<EntityId, StoreError> {
        let mut table = self.write()?;
        let mut id = EntityId::generate();
        while table.contains_key(&id) {
            id = EntityId::generate();
        }
        table.insert(id.clone(), Slot::Available(entity));
        Ok(id)
    }

    /// Consume every listed entity, or none of them.
    ///
    /// Each id must refer to an available entity of the paired kind and may
    /// appear only once. On success the payloads are moved out in request
    /// order and the records stay behind as consumed.
    pub fn try_consume(&self, wanted: &[(&EntityId, E::Kind)]) -> Result<Vec<E>, StoreError> {
        let mut table = self.write()?;

        for (i, (id, kind)) in wanted.iter().enumerate() {
            let repeated = wanted[..i].iter().any(|(seen, _)| seen == id);
            let available = matches!(
                table.get(*id),
                Some(Slot::Available(entity)) if entity.kind() == *kind
            );
            if repeated || !available {
                return Err(StoreError::Conflict {
                    id: (*id).clone(),
                    kind: kind.to_string(),
                });
            }
        }

        let mut taken = Vec::with_capacity(wanted.len());
        for (id, _) in wanted {
            if let Some(slot) = table.get_mut(*id) {
                if let Slot::Available(entity) = std::mem::replace(slot, Slot::Consumed) {
                    taken.push(entity);
                }
            }
        }
        Ok(taken)
    }

    /// Whether the id refers to an available entity of any kind.
    pub fn exists(&self, id: &EntityId) -> Result<bool, StoreError> {
        Ok(matches!(self.read()?.get(id), Some(Slot::Available(_))))
    }

    /// Whether the id refers to an available entity of the given kind.
    pub fn exists_as(&self, id: &EntityId, kind: E::Kind) -> Result<bool, StoreError> {
        Ok(matches!(
            self.read()?.get(id),
            Some(Slot::Available(entity)) if entity.kind() == kind
        ))
    }

    /// Run `f` against an available entity of the given kind.
    pub fn with_available<R>(
        &self,
        id: &EntityId,
        kind: E::Kind,
        f: impl FnOnce(&E) -> R,
    ) -> Result<R, StoreError> {
        match self.read()?.get(id) {
            Some(Slot::Available(entity)) if entity.kind() == kind => Ok(f(entity)),
            _ => Err(unavailable(id, kind)),
        }
    }

    /// Run `f` with mutable access to an available entity of the given kind.
    pub fn with_available_mut<R>(
        &self,
        id: &EntityId,
        kind: E::Kind,
        f: impl FnOnce(&mut E) -> R,
    ) -> Result<R, StoreError> {
        match self.write()?.get_mut(id) {
            Some(Slot::Available(entity)) if entity.kind() == kind => Ok(f(entity)),
            _ => Err(unavailable(id, kind)),
        }
    }

    /// Delete a record entirely, returning the entity if it was available.
    pub fn remove(&self, id: &EntityId) -> Result<Option<E>, StoreError> {
        match self.write()?.remove(id) {
            Some(Slot::Available(entity)) => Ok(Some(entity)),
            _ => Ok(None),
        }
    }

    /// Number of records, available or consumed.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    /// Number of records still available.
    pub fn available(&self) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .values()
            .filter(|slot| matches!(slot, Slot::Available(_)))
            .count())
    }
}

fn unavailable<K: fmt::Display>(id: &EntityId, kind: K) -> StoreError {
    StoreError::Unavailable {
        id: id.clone(),
        kind: kind.to_string(),
    }
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for EntityStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("EntityStore");
        match self.records.read() {
            Ok(table) => out.field("records", &table.len()),
            Err(_) => out.field("records", &"<poisoned>"),
        };
        out.finish()
    }
}
