//! Table schema definitions
//!
//! Tables are created from data, so there are no fixed schema constants;
//! the loader infers a [`ColumnDef`] list and this module turns it into DDL.

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::identifier;
use crate::{Error, Result};

/// SQL to list user tables
pub const LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// SQL to check a table exists
pub const TABLE_EXISTS: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE";

/// SQL to read column metadata in declaration order
pub const TABLE_INFO: &str =
    "SELECT name, type FROM pragma_table_info(?1) ORDER BY cid";

/// Names SQLite resolves to the row id. A user column with one of them hides
/// the real row id, which storage order depends on.
pub const ROWID_ALIASES: [&str; 3] = ["rowid", "oid", "_rowid_"];

/// Storage class a loaded column is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a declared column type to its affinity, following SQLite's rules.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Build a `CREATE TABLE IF NOT EXISTS` statement with quoted identifiers
pub fn create_table_sql(table: &str, columns: &[ColumnDef]) -> Result<String> {
    let defs = columns
        .iter()
        .map(|c| -> Result<String> {
            if ROWID_ALIASES.contains(&c.name.to_ascii_lowercase().as_str()) {
                return Err(Error::InvalidIdentifier(format!("{} is reserved for the row id", c.name)));
            }
            Ok(format!("{} {}", identifier::quote(&c.name)?, c.ty.as_sql()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        identifier::quote(table)?,
        defs.join(", ")
    ))
}
