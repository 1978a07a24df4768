//! Relational repository backend.
//!
//! Each entity type maps to one table with exactly two columns:
//!
//! | column             | content                         |
//! |--------------------|---------------------------------|
//! | `repository_key`   | JSON-serialized key, primary key |
//! | `repository_value` | JSON-serialized entity          |
//!
//! The table is named after the entity type's simple name, generic
//! arguments included (see [`entity_name`](crate::entity_name)). Every
//! statement runs in autocommit mode; no operation spans more than one
//! statement except the duplicate check some dialects need after a failed
//! insert.

mod driver;
mod duckdb_driver;
mod sqlite_driver;

pub use driver::{Driver, DriverRegistry, SqlConnection};
pub use duckdb_driver::DuckDbDriver;
pub use sqlite_driver::SqliteDriver;

use crate::error::{RepositoryError, RepositoryResult};
use crate::manager::RepositoryStrategy;
use crate::store::{entity_name, Entity, Key, KeyExtractor, KeyValueStore};
use std::sync::{Arc, Mutex};
use tessera_common::{keys, ConfigResult, Properties};
use tracing::debug;

/// Connection settings for the relational backend.
#[derive(Clone)]
pub struct JdbcSettings {
    /// Driver identifier, looked up in a [`DriverRegistry`].
    pub driver: String,
    /// Driver-specific connection URL.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Create the entity table when it does not exist.
    pub autocreate_table: bool,
}

impl std::fmt::Debug for JdbcSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JdbcSettings")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("autocreate_table", &self.autocreate_table)
            .finish()
    }
}

impl JdbcSettings {
    /// Reads and validates the `jdbc.*` keys.
    pub fn from_properties(properties: &Properties) -> ConfigResult<Self> {
        let driver = properties.require(keys::JDBC_DRIVER)?.to_string();
        let url = properties.require(keys::JDBC_URL)?.to_string();
        let username = properties.get(keys::JDBC_USERNAME).map(str::to_string);
        let password = properties.credential(keys::JDBC_PASSWORD, keys::JDBC_PASSWORD_FILE)?;
        let autocreate_table = properties.get_bool(keys::JDBC_AUTOCREATE_TABLE, true)?;

        Ok(Self {
            driver,
            url,
            username,
            password,
            autocreate_table,
        })
    }
}

/// A [`KeyValueStore`] backed by a relational database.
///
/// Each instance owns its own connection. Instances for the same entity type
/// and database share data through the database itself.
pub struct RelationalStore<E, K> {
    table: String,
    extractor: KeyExtractor<E, K>,
    connection: Mutex<Box<dyn SqlConnection>>,
}

impl<E, K> std::fmt::Debug for RelationalStore<E, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl<E: Entity, K: Key> RelationalStore<E, K> {
    /// Connects using the `jdbc.*` properties and prepares the entity table.
    ///
    /// Fails with a configuration error when the driver or URL is missing,
    /// the driver is unknown, or the driver refuses the URL.
    pub fn new<F>(
        extractor: F,
        properties: &Properties,
        drivers: &DriverRegistry,
    ) -> RepositoryResult<Self>
    where
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self::with_extractor(Arc::new(extractor), properties, drivers)
    }

    pub fn with_extractor(
        extractor: KeyExtractor<E, K>,
        properties: &Properties,
        drivers: &DriverRegistry,
    ) -> RepositoryResult<Self> {
        let settings = JdbcSettings::from_properties(properties)?;
        Self::with_settings(extractor, &settings, drivers)
    }

    pub fn with_settings(
        extractor: KeyExtractor<E, K>,
        settings: &JdbcSettings,
        drivers: &DriverRegistry,
    ) -> RepositoryResult<Self> {
        let table = entity_name::<E>()?;
        let driver = drivers.get(&settings.driver)?;
        let mut connection = driver.connect(settings)?;

        if settings.autocreate_table {
            connection.create_table(&table)?;
            debug!(%table, driver = %settings.driver, "ensured repository table");
        }

        Ok(Self {
            table,
            extractor,
            connection: Mutex::new(connection),
        })
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn encode_key(&self, key: &K) -> RepositoryResult<String> {
        Ok(serde_json::to_string(key)?)
    }
}

impl<E: Entity, K: Key> KeyValueStore<E, K> for RelationalStore<E, K> {
    fn add(&self, entity: E) -> RepositoryResult<()> {
        let key = (self.extractor)(&entity);
        let encoded_key = self.encode_key(&key)?;
        let value = serde_json::to_string(&entity)?;

        let inserted = self
            .connection
            .lock()
            .unwrap()
            .insert(&self.table, &encoded_key, &value)?;
        if inserted {
            Ok(())
        } else {
            Err(RepositoryError::DuplicateKey(format!("{key:?}")))
        }
    }

    fn update(&self, entity: E) -> RepositoryResult<()> {
        let key = (self.extractor)(&entity);
        let encoded_key = self.encode_key(&key)?;
        let value = serde_json::to_string(&entity)?;

        let updated = self
            .connection
            .lock()
            .unwrap()
            .update(&self.table, &encoded_key, &value)?;
        if updated {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("{key:?}")))
        }
    }

    fn remove(&self, key: &K) -> RepositoryResult<()> {
        let encoded_key = self.encode_key(key)?;
        self.connection
            .lock()
            .unwrap()
            .delete(&self.table, &encoded_key)
    }

    fn remove_all(&self) -> RepositoryResult<()> {
        self.connection.lock().unwrap().delete_all(&self.table)
    }

    fn get(&self, key: &K) -> RepositoryResult<Option<E>> {
        let encoded_key = self.encode_key(key)?;
        let value = self
            .connection
            .lock()
            .unwrap()
            .select(&self.table, &encoded_key)?;
        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> RepositoryResult<Vec<E>> {
        let values = self.connection.lock().unwrap().select_all(&self.table)?;
        values
            .iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }

    fn strategy(&self) -> RepositoryStrategy {
        RepositoryStrategy::Relational
    }
}
