//! CSV export of row sets
//!
//! One record per line, RFC 4180 quoting, file named with a timestamp so
//! repeated exports never overwrite each other.

use std::path::{Path, PathBuf};
use chrono::Local;
use crate::storage::{value, Row, Store};
use crate::Result;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6f";

/// Build `<dir>/<file_name>_<timestamp>.csv`
pub fn timestamped_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!("{}_{}.csv", file_name, Local::now().format(TIMESTAMP_FORMAT)))
}

/// Write rows to a timestamped CSV file and return its path.
pub fn to_csv(header: Option<&[String]>, rows: &[Row], file_name: &str, dir: &Path) -> Result<PathBuf> {
    let path = timestamped_path(dir, file_name);
    write_csv(&path, header, rows)?;
    tracing::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(path)
}

/// Write rows to `path`, header first when given.
pub fn write_csv(path: &Path, header: Option<&[String]>, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if let Some(header) = header {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.write_record(row.iter().map(value::render))?;
    }
    writer.flush()?;
    Ok(())
}

/// Export every row of a table with its header.
pub fn export_table(store: &Store, table: &str, dir: &Path, file_name: Option<&str>) -> Result<PathBuf> {
    let header = store.select_all_column_names(table)?;
    let rows = store.select_all(table)?;
    to_csv(Some(&header), &rows, file_name.unwrap_or(table), dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use crate::ingest::{self, IngestOptions};

    #[test]
    fn test_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            vec![Value::Text("a".into()), Value::Integer(1)],
            vec![Value::Text("b, c".into()), Value::Null],
        ];
        let path = to_csv(Some(&["name".to_string(), "n".to_string()]), &rows, "out", dir.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("out_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "name,n\na,1\n\"b, c\",\n");
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("sales.csv");
        std::fs::write(&source, "region,amount,price,note\neast,10,1.0,\"x, y\"\nwest,20,2.0,\neast,10,1.0,z\n").unwrap();

        let mut store = Store::open_in_memory().unwrap();
        ingest::load(&mut store, &source, &IngestOptions::default()).unwrap();

        let exported = export_table(&store, "sales", dir.path(), None).unwrap();
        let options = IngestOptions::default().with_table_name("sales_copy");
        ingest::load(&mut store, &exported, &options).unwrap();

        assert_eq!(store.table_columns("sales_copy").unwrap(), store.table_columns("sales").unwrap());
        let mut original = store.select_all("sales").unwrap();
        let mut copy = store.select_all("sales_copy").unwrap();
        let key = |r: &Row| r.iter().map(value::render).collect::<Vec<_>>();
        original.sort_by_key(key);
        copy.sort_by_key(key);
        assert_eq!(original, copy);
    }
}
