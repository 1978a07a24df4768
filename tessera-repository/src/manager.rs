//! Per-entity-type repository resolution.

use crate::error::{RepositoryError, RepositoryResult};
use crate::memory::{InMemoryStore, MemoryRegistry};
use crate::relational::{DriverRegistry, RelationalStore};
use crate::store::{entity_name, Entity, Key, KeyExtractor, KeyValueStore};
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tessera_common::{keys, Properties, Strategy, StrategyBindings};
use tracing::info;

/// The repository backends a [`RepositoryManager`] can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryStrategy {
    InMemory,
    Relational,
}

impl Strategy for RepositoryStrategy {
    /// Any `jdbc.driver` or `jdbc.url` setting selects the relational backend.
    fn from_properties(properties: &Properties) -> Self {
        if properties.contains_key(keys::JDBC_DRIVER) || properties.contains_key(keys::JDBC_URL) {
            RepositoryStrategy::Relational
        } else {
            RepositoryStrategy::InMemory
        }
    }
}

type InstanceKey = (RepositoryStrategy, TypeId);

/// Hands out repositories per entity type.
///
/// Resolution order for an entity type `E`:
/// 1. a strategy set with [`RepositoryManager::set_strategy`] for `E`
/// 2. the default set with [`RepositoryManager::set_default_strategy`]
/// 3. the strategy implied by the properties
///
/// The first store built for a (strategy, entity type) is cached and
/// returned by every later call; the properties of later calls are not
/// consulted again for that combination. Asking for the same entity type
/// with a different key type is an invalid-argument error.
pub struct RepositoryManager {
    bindings: StrategyBindings<RepositoryStrategy>,
    memory: Arc<MemoryRegistry>,
    drivers: DriverRegistry,
    instances: Mutex<HashMap<InstanceKey, Arc<dyn Any + Send + Sync>>>,
}

impl Default for RepositoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryManager")
            .field("bindings", &self.bindings)
            .field("memory", &self.memory)
            .field("drivers", &self.drivers)
            .finish_non_exhaustive()
    }
}

impl RepositoryManager {
    /// A manager with its own memory registry and the default drivers.
    pub fn new() -> Self {
        Self::with_registries(Arc::new(MemoryRegistry::new()), DriverRegistry::default())
    }

    pub fn with_registries(memory: Arc<MemoryRegistry>, drivers: DriverRegistry) -> Self {
        Self {
            bindings: StrategyBindings::new(),
            memory,
            drivers,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// The registry backing in-memory repositories.
    pub fn memory_registry(&self) -> &Arc<MemoryRegistry> {
        &self.memory
    }

    /// Uses `strategy` for entity type `E` regardless of default or properties.
    pub fn set_strategy<E: 'static>(&self, strategy: RepositoryStrategy) {
        self.bindings.set_strategy::<E>(strategy);
    }

    /// Sets the fallback used for types without a specific strategy.
    /// `None` restores configuration-driven resolution.
    pub fn set_default_strategy(&self, strategy: Option<RepositoryStrategy>) {
        self.bindings.set_default_strategy(strategy);
    }

    /// Removes all bindings and forgets cached stores.
    ///
    /// Data is not touched: in-memory tables live in the registry and
    /// relational rows live in their database.
    pub fn default_settings(&self) {
        self.bindings.default_settings();
        self.instances.lock().unwrap().clear();
    }

    /// The strategy a call to [`RepositoryManager::get_repository`] would pick.
    pub fn strategy_for<E: 'static>(&self, properties: &Properties) -> RepositoryStrategy {
        self.bindings.resolve(TypeId::of::<E>(), properties)
    }

    /// Returns the repository for entity type `E`, creating it on first use.
    ///
    /// Fails with a configuration error when the chosen backend rejects the
    /// properties, and with an invalid-argument error when `E` has no usable
    /// type name.
    pub fn get_repository<E, K, F>(
        &self,
        extractor: F,
        properties: &Properties,
    ) -> RepositoryResult<Arc<dyn KeyValueStore<E, K>>>
    where
        E: Entity,
        K: Key,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.get_repository_with(Arc::new(extractor), properties)
    }

    /// Like [`RepositoryManager::get_repository`] with a shared extractor.
    pub fn get_repository_with<E: Entity, K: Key>(
        &self,
        extractor: KeyExtractor<E, K>,
        properties: &Properties,
    ) -> RepositoryResult<Arc<dyn KeyValueStore<E, K>>> {
        let entity = entity_name::<E>()?;
        let strategy = self.strategy_for::<E>(properties);
        let key = (strategy, TypeId::of::<E>());

        let cached = self.instances.lock().unwrap().get(&key).cloned();
        if let Some(cached) = cached {
            return cached_store(&cached, &entity);
        }

        // Built unlocked; a racing caller may win the insert below.
        let store: Arc<dyn KeyValueStore<E, K>> = match strategy {
            RepositoryStrategy::InMemory => {
                Arc::new(InMemoryStore::with_extractor(self.memory.clone(), extractor))
            }
            RepositoryStrategy::Relational => Arc::new(RelationalStore::with_extractor(
                extractor,
                properties,
                &self.drivers,
            )?),
        };

        let raced = match self.instances.lock().unwrap().entry(key) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(store.clone()));
                None
            }
        };
        match raced {
            Some(winner) => cached_store(&winner, &entity),
            None => {
                info!(entity = %entity, ?strategy, "created repository");
                Ok(store)
            }
        }
    }
}

fn cached_store<E: Entity, K: Key>(
    cached: &Arc<dyn Any + Send + Sync>,
    entity: &str,
) -> RepositoryResult<Arc<dyn KeyValueStore<E, K>>> {
    cached
        .downcast_ref::<Arc<dyn KeyValueStore<E, K>>>()
        .cloned()
        .ok_or_else(|| {
            RepositoryError::InvalidArgument(format!(
                "repository for {entity} already uses a key type other than {}",
                std::any::type_name::<K>()
            ))
        })
}
