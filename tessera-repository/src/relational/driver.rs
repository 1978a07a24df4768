use super::JdbcSettings;
use crate::error::RepositoryResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_common::{ConfigError, ConfigResult};

/// Statements against a two-column repository table.
///
/// `table` is always a validated identifier; implementations may quote it
/// directly into SQL text. Keys and values are passed as bound parameters.
pub trait SqlConnection: Send {
    /// Creates the table if it does not exist yet.
    fn create_table(&mut self, table: &str) -> RepositoryResult<()>;

    /// Inserts a row. Returns `false` when the key already exists.
    fn insert(&mut self, table: &str, key: &str, value: &str) -> RepositoryResult<bool>;

    /// Replaces the value of an existing row. Returns `false` when no row matched.
    fn update(&mut self, table: &str, key: &str, value: &str) -> RepositoryResult<bool>;

    fn delete(&mut self, table: &str, key: &str) -> RepositoryResult<()>;

    fn delete_all(&mut self, table: &str) -> RepositoryResult<()>;

    fn select(&mut self, table: &str, key: &str) -> RepositoryResult<Option<String>>;

    fn select_all(&mut self, table: &str) -> RepositoryResult<Vec<String>>;
}

/// Opens connections for one database engine.
pub trait Driver: Send + Sync {
    /// Connects to `settings.url`. A URL this driver cannot handle is a
    /// [`ConfigError::InvalidUrl`].
    fn connect(&self, settings: &JdbcSettings) -> RepositoryResult<Box<dyn SqlConnection>>;
}

/// Maps driver identifiers to drivers.
///
/// [`DriverRegistry::default`] knows `sqlite` and `duckdb`.
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("sqlite", Arc::new(super::SqliteDriver));
        registry.register("duckdb", Arc::new(super::DuckDbDriver::default()));
        registry
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.drivers.keys().collect();
        names.sort();
        f.debug_struct("DriverRegistry").field("drivers", &names).finish()
    }
}

impl DriverRegistry {
    /// A registry with no drivers.
    pub fn empty() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Adds or replaces a driver.
    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.into(), driver);
    }

    pub fn get(&self, name: &str) -> ConfigResult<Arc<dyn Driver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDriver(name.to_string()))
    }
}

/// Where a `<driver>:<target>` URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Memory,
    File(PathBuf),
}

/// Parses `<scheme>::memory:` and `<scheme>:<path>`.
pub(crate) fn parse_url(scheme: &str, url: &str) -> ConfigResult<Target> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        driver: scheme.to_string(),
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let rest = url
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| invalid(&format!("expected `{scheme}:<path>` or `{scheme}::memory:`")))?;

    match rest.trim() {
        "" => Err(invalid("missing database path")),
        ":memory:" => Ok(Target::Memory),
        path => Ok(Target::File(PathBuf::from(path))),
    }
}

pub(crate) mod sql {
    pub fn create_table(table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\
             repository_key TEXT PRIMARY KEY NOT NULL, \
             repository_value TEXT NOT NULL)"
        )
    }

    pub fn insert(table: &str) -> String {
        format!("INSERT INTO \"{table}\" (repository_key, repository_value) VALUES (?, ?)")
    }

    pub fn insert_or_ignore(table: &str) -> String {
        format!(
            "INSERT INTO \"{table}\" (repository_key, repository_value) VALUES (?, ?) \
             ON CONFLICT (repository_key) DO NOTHING"
        )
    }

    pub fn update(table: &str) -> String {
        format!("UPDATE \"{table}\" SET repository_value = ? WHERE repository_key = ?")
    }

    pub fn delete(table: &str) -> String {
        format!("DELETE FROM \"{table}\" WHERE repository_key = ?")
    }

    pub fn delete_all(table: &str) -> String {
        format!("DELETE FROM \"{table}\"")
    }

    pub fn select(table: &str) -> String {
        format!("SELECT repository_value FROM \"{table}\" WHERE repository_key = ?")
    }

    pub fn select_all(table: &str) -> String {
        format!("SELECT repository_value FROM \"{table}\" ORDER BY repository_key")
    }
}
