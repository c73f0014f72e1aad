//! SQL identifier handling
//!
//! Table and column names come from file names and CSV headers, so they are
//! never trusted. They are validated and quoted before they reach statement
//! text; values always travel as bound parameters.

use std::path::Path;
use crate::{Error, Result};

/// Validate an identifier and wrap it in double quotes.
///
/// Embedded quotes are doubled, so `a"b` becomes `"a""b"`.
pub fn quote(name: &str) -> Result<String> {
    validate(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Reject names SQLite cannot hold as a quoted identifier.
pub fn validate(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Quote every name and join them for a column list.
pub fn quote_list(names: &[&str]) -> Result<String> {
    let quoted = names.iter().map(|n| quote(n)).collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Derive a table name from a file path: the base name minus its last extension.
///
/// `data/sales.2020.csv` yields `sales.2020`.
pub fn table_name_from_path(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidIdentifier(path.display().to_string()))?;
    validate(&stem)?;
    Ok(stem)
}
