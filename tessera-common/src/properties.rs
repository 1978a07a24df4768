//! String-keyed configuration bag.

use crate::error::{ConfigError, ConfigResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// An ordered set of `key = value` settings.
///
/// Keys are dot-separated. A bag holding the settings of several connections
/// can be narrowed to one of them with [`Properties::subset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a setting, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style variant of [`Properties::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a setting.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Returns the value for `key`, treating blank values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Whether a non-blank value exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the value for `key` or [`ConfigError::MissingProperty`].
    pub fn require(&self, key: &str) -> ConfigResult<&str> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingProperty(key.to_string()))
    }

    /// Parses a boolean setting, falling back to `default` when absent.
    pub fn get_bool(&self, key: &str, default: bool) -> ConfigResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                other => Err(ConfigError::InvalidProperty {
                    key: key.to_string(),
                    reason: format!("expected a boolean, got `{other}`"),
                }),
            },
        }
    }

    /// Returns all settings below `prefix.`, with the prefix stripped.
    ///
    /// `subset("orders")` turns `orders.jdbc.url` into `jdbc.url` and drops
    /// every key outside the `orders` namespace.
    pub fn subset(&self, prefix: &str) -> Properties {
        let prefix = prefix.trim_end_matches('.');
        let scoped = format!("{prefix}.");
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&scoped)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect()
    }

    /// Resolves a credential given either inline or through a file reference.
    ///
    /// The inline value wins when both are present. A file is read once, and
    /// trailing line terminators are removed. Returns `Ok(None)` when neither
    /// form is configured.
    pub fn credential(&self, inline_key: &str, file_key: &str) -> ConfigResult<Option<String>> {
        if let Some(value) = self.get(inline_key) {
            return Ok(Some(value.to_string()));
        }
        let Some(file) = self.get(file_key) else {
            return Ok(None);
        };

        let path = PathBuf::from(file);
        let content = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::CredentialFile { path: path.clone(), source })?;
        debug!(path = %path.display(), "loaded credential from file");
        Ok(Some(content.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Like [`Properties::credential`] but fails when neither form is present.
    pub fn require_credential(&self, inline_key: &str, file_key: &str) -> ConfigResult<String> {
        self.credential(inline_key, file_key)?
            .ok_or_else(|| ConfigError::MissingCredential {
                inline: inline_key.to_string(),
                file: file_key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all settings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        properties.extend(iter);
        properties
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
