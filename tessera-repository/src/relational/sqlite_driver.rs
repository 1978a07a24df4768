//! SQLite driver built on `rusqlite`.

use super::driver::{parse_url, sql, Driver, SqlConnection, Target};
use super::JdbcSettings;
use crate::error::RepositoryResult;
use rusqlite::{params, Connection};
use std::time::Duration;
use tessera_common::ConfigError;
use tracing::debug;

/// Connection URLs: `sqlite::memory:` or `sqlite:<path>`.
///
/// File databases are created on first connect. SQLite has no user
/// accounts, so credentials are accepted and ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl Driver for SqliteDriver {
    fn connect(&self, settings: &JdbcSettings) -> RepositoryResult<Box<dyn SqlConnection>> {
        let target = parse_url("sqlite", &settings.url)?;
        let open = match &target {
            Target::Memory => Connection::open_in_memory(),
            Target::File(path) => Connection::open(path),
        };
        let conn = open.map_err(|e| ConfigError::InvalidUrl {
            driver: settings.driver.clone(),
            url: settings.url.clone(),
            reason: e.to_string(),
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        if settings.username.is_some() || settings.password.is_some() {
            debug!("sqlite ignores credentials");
        }
        debug!(url = %settings.url, "opened sqlite connection");
        Ok(Box::new(SqliteConnection { conn }))
    }
}

struct SqliteConnection {
    conn: Connection,
}

impl SqlConnection for SqliteConnection {
    fn create_table(&mut self, table: &str) -> RepositoryResult<()> {
        self.conn.execute_batch(&sql::create_table(table))?;
        Ok(())
    }

    fn insert(&mut self, table: &str, key: &str, value: &str) -> RepositoryResult<bool> {
        let inserted = self
            .conn
            .execute(&sql::insert_or_ignore(table), params![key, value])?;
        Ok(inserted == 1)
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
        self.conn.execute(&sql::delete_all(table), [])?;
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
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}
