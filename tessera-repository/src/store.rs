//! The key-value store contract.

use crate::error::{RepositoryError, RepositoryResult};
use crate::manager::RepositoryStrategy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// A value that can be kept in any repository backend.
///
/// Implemented automatically; the relational backend needs the serde bounds
/// and the in-memory backend needs `Clone` to hand out snapshots.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Entity for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A value identifying one entity within a store.
pub trait Key: Clone + Eq + Hash + Debug + Serialize + Send + Sync + 'static {}

impl<T> Key for T where T: Clone + Eq + Hash + Debug + Serialize + Send + Sync + 'static {}

/// Maps an entity to its key.
pub type KeyExtractor<E, K> = Arc<dyn Fn(&E) -> K + Send + Sync>;

/// Wraps a closure or function as a [`KeyExtractor`].
pub fn key_extractor<E, K, F>(f: F) -> KeyExtractor<E, K>
where
    F: Fn(&E) -> K + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Storage for entities of one type, addressed by key.
///
/// Duplicate detection is by key only: adding an entity whose key is already
/// present fails even when the stored value is identical.
pub trait KeyValueStore<E, K>: Send + Sync {
    /// Inserts a new entity. Fails with [`RepositoryError::DuplicateKey`]
    /// when its key is already present; nothing is overwritten.
    fn add(&self, entity: E) -> RepositoryResult<()>;

    /// Replaces a stored entity. Fails with [`RepositoryError::NotFound`]
    /// when its key is absent.
    fn update(&self, entity: E) -> RepositoryResult<()>;

    /// Deletes the entity stored under `key`. Missing keys are ignored.
    fn remove(&self, key: &K) -> RepositoryResult<()>;

    /// Deletes every entity of this store's type.
    fn remove_all(&self) -> RepositoryResult<()>;

    /// Looks up one entity.
    fn get(&self, key: &K) -> RepositoryResult<Option<E>>;

    /// Snapshot of all entities at call time. Order is unspecified.
    fn get_all(&self) -> RepositoryResult<Vec<E>>;

    /// The backend serving this store.
    fn strategy(&self) -> RepositoryStrategy;
}

/// The table-safe name of an entity type, used for table names and logging.
///
/// Module paths are dropped and generic arguments are kept, joined with
/// underscores: `shop::Order` becomes `Order` and
/// `shop::Envelope<shop::Invoice>` becomes `Envelope_Invoice`, so distinct
/// instantiations of a generic type get distinct names. Types without a
/// nominal name, such as tuples, arrays, slices, references or raw pointers,
/// are rejected.
pub fn entity_name<E: ?Sized>() -> RepositoryResult<String> {
    let full = std::any::type_name::<E>();
    let invalid = || {
        RepositoryError::InvalidArgument(format!("entity type `{full}` has no usable name"))
    };

    let nominal = full
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '<' | '>' | ',' | ' '));
    if !nominal {
        return Err(invalid());
    }

    let parts = full
        .split(['<', '>', ',', ' '])
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.rsplit("::").next().unwrap_or(segment))
        .collect::<Vec<_>>();
    if parts.is_empty() || !parts.iter().all(|part| is_identifier(part)) {
        return Err(invalid());
    }
    Ok(parts.join("_"))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
