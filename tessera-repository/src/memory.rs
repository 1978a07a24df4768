//! In-memory repository backend.

use crate::error::{RepositoryError, RepositoryResult};
use crate::manager::RepositoryStrategy;
use crate::store::{Entity, Key, KeyExtractor, KeyValueStore};
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

type Table<E, K> = RwLock<HashMap<K, E>>;

/// Owner of every in-memory table.
///
/// One table exists per entity type and is created on first use.
/// All [`InMemoryStore`] handles built from the same registry see the same
/// tables. Create one registry at process start and share it; tests can
/// create their own to stay isolated.
#[derive(Default)]
pub struct MemoryRegistry {
    tables: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegistry")
            .field("tables", &self.table_count())
            .finish()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards every table. Handles stay usable and start from empty tables.
    pub fn clear(&self) {
        let mut tables = self.tables.lock().unwrap();
        debug!(tables = tables.len(), "clearing in-memory repositories");
        tables.clear();
    }

    /// Number of tables created since the last [`MemoryRegistry::clear`].
    pub fn table_count(&self) -> usize {
        self.tables.lock().unwrap().len()
    }

    /// The table for `E`. An entity type has a single key type; asking with
    /// another one is an invalid-argument error.
    fn table<E: Entity, K: Key>(&self) -> RepositoryResult<Arc<Table<E, K>>> {
        let slot = self
            .tables
            .lock()
            .unwrap()
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                Arc::new(Table::<E, K>::new(HashMap::new())) as Arc<dyn Any + Send + Sync>
            })
            .clone();

        slot.downcast::<Table<E, K>>().map_err(|_| {
            RepositoryError::InvalidArgument(format!(
                "in-memory table for {} is not keyed by {}",
                std::any::type_name::<E>(),
                std::any::type_name::<K>()
            ))
        })
    }
}

/// A [`KeyValueStore`] handle over a table in a [`MemoryRegistry`].
///
/// The table is looked up on every call, so a handle created before
/// [`MemoryRegistry::clear`] keeps working afterwards.
pub struct InMemoryStore<E, K> {
    registry: Arc<MemoryRegistry>,
    extractor: KeyExtractor<E, K>,
}

impl<E: Entity, K: Key> InMemoryStore<E, K> {
    pub fn new<F>(registry: Arc<MemoryRegistry>, extractor: F) -> Self
    where
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self::with_extractor(registry, Arc::new(extractor))
    }

    pub fn with_extractor(registry: Arc<MemoryRegistry>, extractor: KeyExtractor<E, K>) -> Self {
        Self { registry, extractor }
    }

    fn table(&self) -> RepositoryResult<Arc<Table<E, K>>> {
        self.registry.table::<E, K>()
    }
}

impl<E: Entity, K: Key> KeyValueStore<E, K> for InMemoryStore<E, K> {
    fn add(&self, entity: E) -> RepositoryResult<()> {
        let key = (self.extractor)(&entity);
        let table = self.table()?;
        let mut map = table.write().unwrap();
        match map.entry(key) {
            Entry::Occupied(occupied) => Err(RepositoryError::DuplicateKey(format!(
                "{:?}",
                occupied.key()
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(entity);
                Ok(())
            }
        }
    }

    fn update(&self, entity: E) -> RepositoryResult<()> {
        let key = (self.extractor)(&entity);
        let table = self.table()?;
        let mut map = table.write().unwrap();
        match map.get_mut(&key) {
            Some(stored) => {
                *stored = entity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("{key:?}"))),
        }
    }

    fn remove(&self, key: &K) -> RepositoryResult<()> {
        self.table()?.write().unwrap().remove(key);
        Ok(())
    }

    fn remove_all(&self) -> RepositoryResult<()> {
        self.table()?.write().unwrap().clear();
        Ok(())
    }

    fn get(&self, key: &K) -> RepositoryResult<Option<E>> {
        Ok(self.table()?.read().unwrap().get(key).cloned())
    }

    fn get_all(&self) -> RepositoryResult<Vec<E>> {
        Ok(self.table()?.read().unwrap().values().cloned().collect())
    }

    fn strategy(&self) -> RepositoryStrategy {
        RepositoryStrategy::InMemory
    }
}
