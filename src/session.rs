//! Session - the load / inspect / normalize workflow
//!
//! A session owns the store and tracks which table the user is working on.
//! The table is always explicit state on the session; loading another file
//! moves the session to the new table but leaves earlier tables intact.
//!
//! This is the library entry point for interactive front ends that walk a
//! user through one table at a time. The CLI is stateless between
//! invocations and calls [`crate::ingest::load`] and [`crate::normalize::apply`]
//! directly instead.
//!
//! ```text
//! NoFileLoaded -> FileLoaded -> ColumnsPresented -> ColumnsSelected
//!              -> MappingDefined -> MappingApplied
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use rusqlite::types::Value;
use crate::ingest::{self, IngestOptions, LoadReport};
use crate::normalize::{self, ValueMapping};
use crate::storage::Store;
use crate::{Error, Result};

/// Where the session is in the workflow
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NoFileLoaded,
    FileLoaded {
        table: String,
    },
    ColumnsPresented {
        table: String,
        columns: Vec<String>,
    },
    ColumnsSelected {
        table: String,
        selected: Vec<String>,
    },
    MappingDefined {
        table: String,
        selected: Vec<String>,
        mappings: BTreeMap<String, ValueMapping>,
    },
    MappingApplied {
        table: String,
        changed: BTreeMap<String, usize>,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NoFileLoaded => "no file loaded",
            SessionState::FileLoaded { .. } => "file loaded",
            SessionState::ColumnsPresented { .. } => "columns presented",
            SessionState::ColumnsSelected { .. } => "columns selected",
            SessionState::MappingDefined { .. } => "mapping defined",
            SessionState::MappingApplied { .. } => "mapping applied",
        }
    }

    /// The table this state addresses, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            SessionState::NoFileLoaded => None,
            SessionState::FileLoaded { table }
            | SessionState::ColumnsPresented { table, .. }
            | SessionState::ColumnsSelected { table, .. }
            | SessionState::MappingDefined { table, .. }
            | SessionState::MappingApplied { table, .. } => Some(table.as_str()),
        }
    }
}

pub struct Session {
    store: Store,
    options: IngestOptions,
    state: SessionState,
}

impl Session {
    pub fn new(store: Store, options: IngestOptions) -> Self {
        Self { store, options, state: SessionState::NoFileLoaded }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn table(&self) -> Option<&str> {
        self.state.table()
    }

    /// Give the store back, ending the session
    pub fn into_store(self) -> Store {
        self.store
    }

    fn wrong_state(&self, operation: &str) -> Error {
        Error::InvalidState(format!("cannot {} while {}", operation, self.state.name()))
    }

    /// Load a file; valid from any state.
    pub fn load_file(&mut self, path: &Path) -> Result<LoadReport> {
        let report = ingest::load(&mut self.store, path, &self.options)?;
        if let Some(previous) = self.state.table() {
            if previous != report.table {
                tracing::debug!("Session moved from '{}' to '{}'", previous, report.table);
            }
        }
        self.state = SessionState::FileLoaded { table: report.table.clone() };
        Ok(report)
    }

    /// List the loaded table's columns for selection.
    pub fn present_columns(&mut self) -> Result<Vec<String>> {
        let table = match &self.state {
            SessionState::NoFileLoaded => return Err(self.wrong_state("present columns")),
            SessionState::MappingDefined { .. } => return Err(self.wrong_state("present columns")),
            other => other.table().map(str::to_string).unwrap_or_default(),
        };
        let columns = self.store.select_all_column_names(&table)?;
        self.state = SessionState::ColumnsPresented { table, columns: columns.clone() };
        Ok(columns)
    }

    /// Choose the columns to normalize.
    pub fn select_columns(&mut self, selected: &[&str]) -> Result<()> {
        let SessionState::ColumnsPresented { table, columns } = &self.state else {
            return Err(self.wrong_state("select columns"));
        };
        if let Some(missing) = selected.iter().find(|s| !columns.iter().any(|c| c == *s)) {
            return Err(Error::UnknownColumn { table: table.clone(), column: missing.to_string() });
        }
        let table = table.clone();
        self.state = SessionState::ColumnsSelected {
            table,
            selected: selected.iter().map(|s| s.to_string()).collect(),
        };
        Ok(())
    }

    fn selected(&self) -> Option<(&str, &[String])> {
        match &self.state {
            SessionState::ColumnsSelected { table, selected }
            | SessionState::MappingDefined { table, selected, .. } => Some((table.as_str(), selected.as_slice())),
            _ => None,
        }
    }

    /// Distinct values of a selected column: the candidates for a mapping.
    pub fn distinct_values(&self, column: &str) -> Result<Vec<Value>> {
        let (table, selected) = self.selected().ok_or_else(|| self.wrong_state("list distinct values"))?;
        if !selected.iter().any(|c| c == column) {
            return Err(Error::InvalidState(format!("column '{}' is not selected", column)));
        }
        self.store.select_distinct_column(column, table)
    }

    /// Record a mapping for a selected column, replacing any earlier one.
    pub fn define_mapping(&mut self, column: &str, mapping: ValueMapping) -> Result<()> {
        let (table, selected) = self.selected().ok_or_else(|| self.wrong_state("define a mapping"))?;
        if !selected.iter().any(|c| c == column) {
            return Err(Error::InvalidState(format!("column '{}' is not selected", column)));
        }
        let table = table.to_string();
        let selected = selected.to_vec();

        let mut mappings = match std::mem::replace(&mut self.state, SessionState::NoFileLoaded) {
            SessionState::MappingDefined { mappings, .. } => mappings,
            _ => BTreeMap::new(),
        };
        mappings.insert(column.to_string(), mapping);
        self.state = SessionState::MappingDefined { table, selected, mappings };
        Ok(())
    }

    /// Apply every defined mapping in one transaction; returns rows changed
    /// per column. On failure nothing is changed and the mappings stay defined.
    pub fn apply_mappings(&mut self) -> Result<BTreeMap<String, usize>> {
        let SessionState::MappingDefined { table, mappings, .. } = &self.state else {
            return Err(self.wrong_state("apply mappings"));
        };
        let table = table.clone();
        let mappings = mappings.clone();

        self.store.begin_transaction()?;
        let applied = mappings
            .iter()
            .map(|(column, mapping)| -> Result<(String, usize)> {
                let n = normalize::apply_in_transaction(&self.store, &table, column, mapping)?;
                Ok((column.clone(), n))
            })
            .collect::<Result<BTreeMap<_, _>>>();

        let changed = match applied {
            Ok(changed) => {
                self.store.commit()?;
                changed
            }
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::warn!("Rollback after failed apply on '{}' failed: {}", table, rollback_err);
                }
                return Err(e);
            }
        };
        self.state = SessionState::MappingApplied { table, changed: changed.clone() };
        Ok(changed)
    }
}
