//! Shared test helpers for repository tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_common::{keys, Properties};

/// Value object used as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sku(pub u32);

/// Aggregate keyed by its SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: Sku,
    pub name: String,
    pub stock: u32,
}

impl Product {
    pub fn new(sku: u32, name: &str) -> Self {
        Self {
            sku: Sku(sku),
            name: name.to_string(),
            stock: 0,
        }
    }

    pub fn sku(&self) -> Sku {
        self.sku
    }
}

/// A second entity type, keyed by a plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
}

impl Customer {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
        }
    }
}

/// Relational properties for a SQLite file inside `dir`.
pub fn sqlite_properties(dir: &Path) -> Properties {
    Properties::new()
        .with(keys::JDBC_DRIVER, "sqlite")
        .with(
            keys::JDBC_URL,
            format!("sqlite:{}", dir.join("repository.db").display()),
        )
}

/// Relational properties for a private in-memory SQLite database.
pub fn sqlite_memory_properties() -> Properties {
    Properties::new()
        .with(keys::JDBC_DRIVER, "sqlite")
        .with(keys::JDBC_URL, "sqlite::memory:")
}
