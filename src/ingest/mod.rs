//! Ingest Pipeline - delimited files into tables
//!
//! `load` reads a file, names a table after it, infers a schema when the
//! table is new and appends the rows in a single transaction. A failed load
//! leaves the store untouched.

pub mod inference;
pub mod reader;

use std::path::Path;
use encoding_rs::Encoding;
use serde::Serialize;
use crate::storage::{value, ColumnDef, Row, Store};
use crate::{identifier, Error, Result};

/// Options controlling how a file is read and where it lands
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    /// Load into this table instead of the one named after the file
    pub table_name: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            // The WHATWG label "iso-8859-1" resolves to windows-1252, which
            // maps every byte to a character.
            encoding: encoding_rs::WINDOWS_1252,
            table_name: None,
        }
    }
}

impl IngestOptions {
    /// Set the encoding from a label such as `latin1` or `utf-8`
    pub fn with_encoding_label(mut self, label: &str) -> Result<Self> {
        self.encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::Config(format!("unknown encoding: {}", label)))?;
        Ok(self)
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() {
            return Err(Error::Config(format!("delimiter must be a single byte: {:?}", delimiter)));
        }
        self.delimiter = delimiter as u8;
        Ok(self)
    }

    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }
}

/// Outcome of a load
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub rows_inserted: usize,
    /// True when the table did not exist before this load
    pub created: bool,
}

/// Load a delimited file into the store.
pub fn load(store: &mut Store, path: &Path, options: &IngestOptions) -> Result<LoadReport> {
    let table = match &options.table_name {
        Some(name) => {
            identifier::validate(name)?;
            name.clone()
        }
        None => identifier::table_name_from_path(path)?,
    };

    let csv = reader::read_file(path, options.delimiter, options.encoding)?;
    let names = inference::column_names(&csv.headers);
    let existing = store.table_exists(&table)?;

    let columns = if existing {
        let known = store.table_columns(&table)?;
        names
            .iter()
            .map(|name| {
                known.iter().find(|c| c.name.eq_ignore_ascii_case(name)).cloned().ok_or_else(|| Error::SchemaMismatch {
                    table: table.clone(),
                    column: name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        inference::infer_columns(&names, &csv.records)
    };

    let rows: Vec<Row> = csv
        .records
        .iter()
        .map(|record| {
            record
                .iter()
                .zip(&columns)
                .map(|(field, col)| value::parse_field(field, col.ty))
                .collect()
        })
        .collect();

    store.begin_transaction()?;
    let written = write_rows(store, &table, &columns, &rows, !existing);
    let rows_inserted = match written {
        Ok(n) => {
            store.commit()?;
            n
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::warn!("Rollback after failed load of {} failed: {}", table, rollback_err);
            }
            return Err(e);
        }
    };

    tracing::info!(
        "Loaded {} rows from {} into '{}'{}",
        rows_inserted,
        path.display(),
        table,
        if existing { " (appended)" } else { "" }
    );

    Ok(LoadReport { table, columns, rows_inserted, created: !existing })
}

fn write_rows(store: &Store, table: &str, columns: &[ColumnDef], rows: &[Row], create: bool) -> Result<usize> {
    if create {
        store.create_table(table, columns)?;
    }
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    store.insert_many(table, &names, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use crate::storage::ColumnType;

    fn write(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_sales() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "sales.csv", b"region,amount\neast,10\nwest,20\n");
        let mut store = Store::open_in_memory().unwrap();

        let report = load(&mut store, &path, &IngestOptions::default()).unwrap();
        assert_eq!(report.table, "sales");
        assert_eq!(report.rows_inserted, 2);
        assert!(report.created);
        assert_eq!(report.columns[1], ColumnDef::new("amount", ColumnType::Integer));

        assert_eq!(store.row_count("sales").unwrap(), 2);
        assert_eq!(store.select_all_column_names("sales").unwrap(), vec!["region", "amount"]);
        assert_eq!(
            store.select_last("sales", &[]).unwrap(),
            vec![Value::Text("west".into()), Value::Integer(20)]
        );
    }

    #[test]
    fn test_load_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "sales.csv", b"region,amount\neast,10\n");
        let mut store = Store::open_in_memory().unwrap();

        load(&mut store, &path, &IngestOptions::default()).unwrap();
        let second = load(&mut store, &path, &IngestOptions::default()).unwrap();
        assert!(!second.created);
        assert_eq!(store.row_count("sales").unwrap(), 2);
    }

    #[test]
    fn test_second_file_keeps_first_table() {
        let dir = tempfile::tempdir().unwrap();
        let sales = write(dir.path(), "sales.csv", b"region,amount\neast,10\nwest,20\n");
        let staff = write(dir.path(), "staff.csv", b"name\nann\n");
        let mut store = Store::open_in_memory().unwrap();

        load(&mut store, &sales, &IngestOptions::default()).unwrap();
        load(&mut store, &staff, &IngestOptions::default()).unwrap();

        assert_eq!(store.row_count("sales").unwrap(), 2);
        assert_eq!(store.row_count("staff").unwrap(), 1);
        assert_eq!(store.list_tables().unwrap(), vec!["sales", "staff"]);
    }

    #[test]
    fn test_append_schema_mismatch_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "sales.csv", b"region,amount\neast,10\n");
        let mut store = Store::open_in_memory().unwrap();
        load(&mut store, &first, &IngestOptions::default()).unwrap();

        let other_dir = dir.path().join("other");
        std::fs::create_dir(&other_dir).unwrap();
        let second = write(&other_dir, "sales.csv", b"region,price\nnorth,5\n");
        let result = load(&mut store, &second, &IngestOptions::default());
        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
        assert_eq!(store.row_count("sales").unwrap(), 1);
    }

    #[test]
    fn test_append_with_different_case() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "Sales.csv", b"region,amount\neast,10\n");
        let second = write(dir.path(), "sales.csv", b"Region,AMOUNT\nwest,20\n");
        let mut store = Store::open_in_memory().unwrap();

        assert!(load(&mut store, &first, &IngestOptions::default()).unwrap().created);
        let report = load(&mut store, &second, &IngestOptions::default()).unwrap();
        assert!(!report.created);
        assert_eq!(report.columns[1], ColumnDef::new("amount", ColumnType::Integer));
        assert_eq!(store.row_count("sales").unwrap(), 2);
        assert_eq!(store.list_tables().unwrap(), vec!["Sales"]);
    }

    #[test]
    fn test_rowid_header_keeps_storage_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.csv", b"rowid,v\nb,first\na,second\n");
        let mut store = Store::open_in_memory().unwrap();

        let report = load(&mut store, &path, &IngestOptions::default()).unwrap();
        assert_eq!(report.columns[0].name, "rowid.1");
        assert_eq!(store.select_last("t", &["v"]).unwrap(), vec![Value::Text("second".into())]);
        assert_eq!(
            store.select("t", &["v"], None).unwrap(),
            vec![vec![Value::Text("first".into())], vec![Value::Text("second".into())]]
        );

        let dupes = write(dir.path(), "d.csv", b"oid,v\nx,first\nx,second\n");
        load(&mut store, &dupes, &IngestOptions::default()).unwrap();
        assert_eq!(store.select("d", &["v"], Some(1)).unwrap(), vec![vec![Value::Text("second".into())]]);
    }

    #[test]
    fn test_case_colliding_headers_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "people.csv", b"Name,name,a,a,a.1\nx,y,1,2,3\n");
        let mut store = Store::open_in_memory().unwrap();

        load(&mut store, &path, &IngestOptions::default()).unwrap();
        assert_eq!(
            store.select_all_column_names("people").unwrap(),
            vec!["Name", "name.1", "a", "a.1", "a.1.1"]
        );
    }

    #[test]
    fn test_missing_file_has_no_effect() {
        let mut store = Store::open_in_memory().unwrap();
        let result = load(&mut store, Path::new("/no/such/file.csv"), &IngestOptions::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(store.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_table_name_override_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "raw.txt", b"a,b\n1,\n,x\n");
        let mut store = Store::open_in_memory().unwrap();

        let options = IngestOptions::default().with_table_name("cleaned");
        let report = load(&mut store, &path, &options).unwrap();
        assert_eq!(report.table, "cleaned");
        assert_eq!(
            store.select_all("cleaned").unwrap(),
            vec![vec![Value::Integer(1), Value::Null], vec![Value::Null, Value::Text("x".into())]]
        );
    }

    #[test]
    fn test_latin1_bytes_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "cities.csv", b"city\nZ\xfcrich\n");
        let mut store = Store::open_in_memory().unwrap();

        load(&mut store, &path, &IngestOptions::default()).unwrap();
        assert_eq!(store.select_all("cities").unwrap(), vec![vec![Value::Text("Zürich".into())]]);
    }

    #[test]
    fn test_encoding_label() {
        let options = IngestOptions::default().with_encoding_label("utf-8").unwrap();
        assert_eq!(options.encoding, encoding_rs::UTF_8);
        assert!(IngestOptions::default().with_encoding_label("klingon").is_err());
        assert!(IngestOptions::default().with_delimiter('é').is_err());
    }
}
