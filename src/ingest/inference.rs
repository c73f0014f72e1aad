//! Column naming and type inference for loaded files

use std::collections::HashSet;
use crate::storage::schema::ROWID_ALIASES;
use crate::storage::{ColumnDef, ColumnType};

/// Turn raw header fields into usable, unique column names.
///
/// Blank headers become `column_<n>` (1-based); repeats get `.1`, `.2`, ...
/// Uniqueness is case-insensitive, matching SQLite, and the row id aliases
/// are always suffixed.
pub fn column_names(headers: &[String]) -> Vec<String> {
    let mut issued: HashSet<String> = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let base = match raw.trim() {
                "" => format!("column_{}", idx + 1),
                trimmed => trimmed.to_string(),
            };
            let mut name = base.clone();
            let mut suffix = 0;
            loop {
                let key = name.to_ascii_lowercase();
                if !ROWID_ALIASES.contains(&key.as_str()) && !issued.contains(&key) {
                    issued.insert(key);
                    break name;
                }
                suffix += 1;
                name = format!("{}.{}", base, suffix);
            }
        })
        .collect()
}

/// Infer a type for every column from all of its values.
pub fn infer_columns(names: &[String], records: &[Vec<String>]) -> Vec<ColumnDef> {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values = records.iter().filter_map(|r| r.get(idx)).map(String::as_str);
            ColumnDef::new(name.clone(), infer_type(values))
        })
        .collect()
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut all_int = true;
    let mut all_real = true;
    let mut any = false;

    for v in values.filter(|v| !v.is_empty()) {
        any = true;
        if all_int && v.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_real && v.parse::<f64>().is_err() {
            all_real = false;
        }
        if !all_int && !all_real {
            break;
        }
    }

    match (any, all_int, all_real) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::Integer,
        (true, false, true) => ColumnType::Real,
        _ => ColumnType::Text,
    }
}
