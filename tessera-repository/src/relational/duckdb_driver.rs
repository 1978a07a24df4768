//! DuckDB driver.

use super::driver::{parse_url, sql, Driver, SqlConnection, Target};
use super::JdbcSettings;
use crate::error::RepositoryResult;
use duckdb::{params, Connection};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tessera_common::ConfigError;
use tracing::debug;

/// Connection URLs: `duckdb::memory:` or `duckdb:<path>`.
///
/// DuckDB allows one open database instance per file within a process, so
/// connections to the same file are cloned from a shared instance. Every
/// `duckdb::memory:` connect opens a fresh, private database.
///
/// A file instance stays open, and its file locked, until the driver is
/// dropped. The number of distinct files ever opened bounds the set; a
/// [`DriverRegistry`](super::DriverRegistry) holding this driver keeps them
/// open for its own lifetime.
#[derive(Default)]
pub struct DuckDbDriver {
    databases: Mutex<HashMap<PathBuf, Connection>>,
}

impl std::fmt::Debug for DuckDbDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbDriver")
            .field("open_files", &self.open_files())
            .finish()
    }
}

impl DuckDbDriver {
    /// Number of database files this driver holds open.
    pub fn open_files(&self) -> usize {
        self.databases.lock().unwrap().len()
    }
}

impl Driver for DuckDbDriver {
    fn connect(&self, settings: &JdbcSettings) -> RepositoryResult<Box<dyn SqlConnection>> {
        let rejected = |e: duckdb::Error| ConfigError::InvalidUrl {
            driver: settings.driver.clone(),
            url: settings.url.clone(),
            reason: e.to_string(),
        };

        let conn = match parse_url("duckdb", &settings.url)? {
            Target::Memory => Connection::open_in_memory().map_err(rejected)?,
            Target::File(path) => {
                let mut databases = self.databases.lock().unwrap();
                match databases.get(&path) {
                    Some(shared) => shared.try_clone()?,
                    None => {
                        let opened = Connection::open(&path).map_err(rejected)?;
                        let conn = opened.try_clone()?;
                        databases.insert(path, opened);
                        conn
                    }
                }
            }
        };

        if settings.username.is_some() || settings.password.is_some() {
            debug!("duckdb ignores credentials");
        }
        debug!(url = %settings.url, "opened duckdb connection");
        Ok(Box::new(DuckDbConnection { conn }))
    }
}

struct DuckDbConnection {
    conn: Connection,
}

impl SqlConnection for DuckDbConnection {
    fn create_table(&mut self, table: &str) -> RepositoryResult<()> {
        self.conn.execute_batch(&sql::create_table(table))?;
        Ok(())
    }

    fn insert(&mut self, table: &str, key: &str, value: &str) -> RepositoryResult<bool> {
        match self.conn.execute(&sql::insert(table), params![key, value]) {
            Ok(_) => Ok(true),
            // DuckDB reports primary-key conflicts as a generic constraint error.
            Err(err) if self.select(table, key)?.is_some() => {
                debug!(%table, error = %err, "insert rejected by existing key");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update(&mut self, table: &str, key: &str, value: &str) -> RepositoryResult<bool> {
        let updated = self.conn.execute(&sql::update(table), params![value, key])?;
        Ok(updated > 0)
    }

    fn delete(&mut self, table: &str, key: &str) -> RepositoryResult<()> {
        self.conn.execute(&sql::delete(table), params![key])?;
        Ok(())
    }

    fn delete_all(&mut self, table: &str) -> RepositoryResult<()> {
        self.conn.execute(&sql::delete_all(table), params![])?;
        Ok(())
    }

    fn select(&mut self, table: &str, key: &str) -> RepositoryResult<Option<String>> {
        let mut stmt = self.conn.prepare(&sql::select(table))?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn select_all(&mut self, table: &str) -> RepositoryResult<Vec<String>> {
        let mut stmt = self.conn.prepare(&sql::select_all(table))?;
        let values = stmt
            .query_map(params![], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}
