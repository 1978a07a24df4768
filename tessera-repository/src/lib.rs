//! Key-value repositories for Tessera.
//!
//! Business code stores aggregates through the [`KeyValueStore`] contract
//! without knowing where they end up. Two backends are provided:
//!
//! - [`InMemoryStore`]: process-local maps held by a [`MemoryRegistry`]
//! - [`RelationalStore`]: one two-column table per entity type, reached
//!   through a [`DriverRegistry`] (SQLite and DuckDB built in)
//!
//! # Strategy resolution
//!
//! [`RepositoryManager`] picks the backend per entity type. A binding set for
//! the exact type wins, then the process-wide default, then the configuration:
//! a `jdbc.driver`/`jdbc.url` pair selects the relational store and anything
//! else falls back to memory. Constructed stores are cached per
//! (strategy, entity type), so repeated lookups share one handle.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tessera_common::Properties;
//! use tessera_repository::RepositoryManager;
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Account {
//!     id: u64,
//!     owner: String,
//! }
//!
//! let manager = RepositoryManager::new();
//! let accounts = manager
//!     .get_repository(|a: &Account| a.id, &Properties::new())
//!     .unwrap();
//!
//! accounts.add(Account { id: 1, owner: "ada".into() }).unwrap();
//! assert_eq!(accounts.get(&1).unwrap().unwrap().owner, "ada");
//! ```

mod error;
mod manager;
mod memory;
pub mod relational;
mod store;

pub use error::{RepositoryError, RepositoryResult};
pub use manager::{RepositoryManager, RepositoryStrategy};
pub use memory::{InMemoryStore, MemoryRegistry};
pub use relational::{DriverRegistry, JdbcSettings, RelationalStore};
pub use store::{entity_name, key_extractor, Entity, Key, KeyExtractor, KeyValueStore};
