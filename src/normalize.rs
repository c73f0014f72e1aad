//! Value normalization - rewrite a column onto a canonical value set
//!
//! A [`ValueMapping`] pairs raw values with their replacements. Applying it
//! rewrites matching cells of one column of one table and reports how many
//! rows changed.

use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::storage::Store;
use crate::{Error, Result};

/// Old value -> new value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueMapping {
    pairs: BTreeMap<String, String>,
}

impl ValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Parse `old=new`. Only the first `=` splits, so values may contain `=`.
    pub fn parse_pair(s: &str) -> Result<(String, String)> {
        let (old, new) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidMapping(format!("expected old=new, got {:?}", s)))?;
        Ok((old.to_string(), new.to_string()))
    }

    /// Load a mapping from a TOML or JSON file of `"old" = "new"` entries.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            serde_json::from_str(&contents).map_err(|e| Error::InvalidMapping(e.to_string()))
        } else {
            toml::from_str(&contents).map_err(|e| Error::InvalidMapping(e.to_string()))
        }
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) -> Option<String> {
        self.pairs.insert(old.into(), new.into())
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.pairs.get(old).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Apply a mapping to one column; returns the number of rows changed.
///
/// All substitutions run in one transaction against the original values, so
/// a chain like `a=b, b=c` does not turn `a` into `c`.
pub fn apply(store: &mut Store, table: &str, column: &str, mapping: &ValueMapping) -> Result<usize> {
    store.begin_transaction()?;
    match apply_in_transaction(store, table, column, mapping) {
        Ok(changed) => {
            store.commit()?;
            Ok(changed)
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::warn!("Rollback after failed normalization of {}.{} failed: {}", table, column, rollback_err);
            }
            Err(e)
        }
    }
}

/// Apply a mapping inside a transaction the caller already opened.
pub(crate) fn apply_in_transaction(store: &Store, table: &str, column: &str, mapping: &ValueMapping) -> Result<usize> {
    if !store.select_all_column_names(table)?.iter().any(|c| c.eq_ignore_ascii_case(column)) {
        return Err(Error::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        });
    }

    let pairs: Vec<(&str, &str)> = mapping.iter().filter(|(old, new)| old != new).collect();
    if pairs.is_empty() {
        return Ok(0);
    }
    let changed = rewrite(store, table, column, &pairs)?;
    tracing::info!("Normalized {}.{}: {} rows changed", table, column, changed);
    Ok(changed)
}

fn rewrite(store: &Store, table: &str, column: &str, pairs: &[(&str, &str)]) -> Result<usize> {
    // Stage through placeholder tokens so one pair's output is never
    // matched by a later pair's input.
    let staged: Vec<(String, &str)> = pairs
        .iter()
        .enumerate()
        .map(|(i, (_, new))| (format!("\u{1f}datapyler-normalize-{}\u{1f}", i), *new))
        .collect();

    let mut changed = 0;
    for ((old, _), (token, _)) in pairs.iter().zip(&staged) {
        changed += store.update_column_values(table, column, old, token)?;
    }
    for (token, new) in &staged {
        store.update_column_values(table, column, token, new)?;
    }
    Ok(changed)
}
