//! SQLite storage implementation

use std::fmt;
use std::path::{Path, PathBuf};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use rusqlite::types::Value;
use crate::{Error, Result, identifier};
use super::schema::{self, ColumnDef, ColumnType};
use super::value::Row;

/// Where a store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    InMemory,
}

impl Location {
    /// `:memory:` selects an in-memory database, anything else is a file path.
    pub fn parse(s: &str) -> Self {
        if s == ":memory:" {
            Location::InMemory
        } else {
            Location::File(PathBuf::from(s))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::InMemory => f.write_str(":memory:"),
        }
    }
}

/// SQLite-backed store of loaded tables.
///
/// The connection is released on [`Store::close`] or when the store is
/// dropped; pending writes are committed either way.
pub struct Store {
    conn: Option<Connection>,
    location: Location,
}

impl Store {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Self::at(Location::File(path.to_path_buf()))
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::at(Location::InMemory)
    }

    /// Open a store at the given location.
    ///
    /// Connection failures surface as [`Error::StorageUnavailable`].
    pub fn at(location: Location) -> Result<Self> {
        let unavailable = |e: rusqlite::Error| Error::StorageUnavailable(format!("{}: {}", location, e));
        let conn = match &location {
            Location::File(path) => Connection::open(path).map_err(unavailable)?,
            Location::InMemory => Connection::open_in_memory().map_err(unavailable)?,
        };
        // SQLite opens lazily; touch the file so bad paths fail here.
        conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
            .map_err(unavailable)?;
        tracing::debug!("Opened store at {}", location);
        Ok(Self { conn: Some(conn), location })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Commit outstanding writes and release the connection. No-op when closed.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        conn.close().map_err(|(_, e)| Error::Storage(e))?;
        tracing::debug!("Closed store at {}", self.location);
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::StorageUnavailable(format!("{}: store is closed", self.location)))
    }

    // ========== Schema Operations ==========

    /// Check whether a table exists
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn()?.query_row(schema::TABLE_EXISTS, [table], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// List user tables by name
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare(schema::LIST_TABLES)?;
        let tables = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tables)
    }

    /// Column definitions of a table, in declaration order
    pub fn table_columns(&self, table: &str) -> Result<Vec<ColumnDef>> {
        identifier::validate(table)?;
        let mut stmt = self.conn()?.prepare(schema::TABLE_INFO)?;
        let columns = stmt
            .query_map([table], |row| {
                let name: String = row.get(0)?;
                let declared: String = row.get(1)?;
                Ok(ColumnDef::new(name, ColumnType::from_declared(&declared)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(Error::UnknownTable(table.to_string()));
        }
        Ok(columns)
    }

    /// Ordered column names of a table, read from schema metadata
    pub fn select_all_column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table_columns(table)?.into_iter().map(|c| c.name).collect())
    }

    /// Create a table if it doesn't exist
    pub fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<()> {
        let sql = schema::create_table_sql(table, columns)?;
        tracing::debug!("{}", sql);
        self.conn()?.execute(&sql, [])?;
        Ok(())
    }

    /// Build a quoted column list, checking every name against the table.
    /// An empty selection expands to every column.
    fn column_list(&self, table: &str, columns: &[&str]) -> Result<String> {
        let known = self.select_all_column_names(table)?;
        if columns.is_empty() {
            let all: Vec<&str> = known.iter().map(String::as_str).collect();
            return identifier::quote_list(&all);
        }
        self.ensure_columns(table, &known, columns)?;
        identifier::quote_list(columns)
    }

    fn ensure_columns(&self, table: &str, known: &[String], columns: &[&str]) -> Result<()> {
        for column in columns {
            if !known.iter().any(|k| k.eq_ignore_ascii_case(column)) {
                return Err(Error::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::debug!("{}", sql);
        let mut stmt = self.conn()?.prepare(sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width).map(|i| row.get::<_, Value>(i)).collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ========== Select Operations ==========

    /// Select the last `limit` rows of `columns` in storage order, or every row
    /// when `limit` is `None`. An empty `columns` slice selects every column.
    pub fn select(&self, table: &str, columns: &[&str], limit: Option<usize>) -> Result<Vec<Row>> {
        let cols = self.column_list(table, columns)?;
        let t = identifier::quote(table)?;
        match limit {
            Some(n) => {
                let sql = format!(
                    "SELECT {cols} FROM {t} WHERE rowid IN \
                     (SELECT rowid FROM {t} ORDER BY rowid DESC LIMIT ?1) ORDER BY rowid"
                );
                self.query_rows(&sql, &[Value::Integer(n as i64)])
            }
            None => {
                let sql = format!("SELECT {cols} FROM {t} ORDER BY rowid");
                self.query_rows(&sql, &[])
            }
        }
    }

    /// Select the first row in storage order
    pub fn select_one(&self, table: &str, columns: &[&str]) -> Result<Option<Row>> {
        let cols = self.column_list(table, columns)?;
        let sql = format!("SELECT {cols} FROM {} ORDER BY rowid LIMIT 1", identifier::quote(table)?);
        tracing::debug!("{}", sql);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let width = stmt.column_count();
        let row = stmt
            .query_row([], |row| {
                (0..width).map(|i| row.get::<_, Value>(i)).collect::<rusqlite::Result<Row>>()
            })
            .optional()?;
        Ok(row)
    }

    /// Select the most recently inserted row
    pub fn select_last(&self, table: &str, columns: &[&str]) -> Result<Row> {
        self.select(table, columns, Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmptyResult { table: table.to_string() })
    }

    /// Select every column of every row
    pub fn select_all(&self, table: &str) -> Result<Vec<Row>> {
        self.select(table, &[], None)
    }

    /// Unique values of one column, in engine order
    pub fn select_distinct_column(&self, column: &str, table: &str) -> Result<Vec<Value>> {
        let known = self.select_all_column_names(table)?;
        self.ensure_columns(table, &known, &[column])?;
        let sql = format!(
            "SELECT DISTINCT {} FROM {}",
            identifier::quote(column)?,
            identifier::quote(table)?
        );
        let values = self.query_rows(&sql, &[])?
            .into_iter()
            .filter_map(|mut row| row.pop())
            .collect();
        Ok(values)
    }

    /// Count rows in a table
    pub fn row_count(&self, table: &str) -> Result<usize> {
        if !self.table_exists(table)? {
            return Err(Error::UnknownTable(table.to_string()));
        }
        let sql = format!("SELECT COUNT(*) FROM {}", identifier::quote(table)?);
        let count: i64 = self.conn()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Write Operations ==========

    /// Insert one row
    pub fn insert(&self, table: &str, columns: &[&str], values: &[Value]) -> Result<()> {
        self.insert_many(table, columns, &[values.to_vec()])?;
        Ok(())
    }

    /// Insert many rows through one prepared statement
    pub fn insert_many(&self, table: &str, columns: &[&str], rows: &[Row]) -> Result<usize> {
        let known = self.select_all_column_names(table)?;
        self.ensure_columns(table, &known, columns)?;
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(Error::ArityMismatch { expected: columns.len(), found: bad.len() });
        }

        let placeholders = (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            identifier::quote(table)?,
            identifier::quote_list(columns)?,
            placeholders
        );
        tracing::debug!("{} ({} rows)", sql, rows.len());

        let mut stmt = self.conn()?.prepare_cached(&sql)?;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
        Ok(rows.len())
    }

    /// Replace `from` with `to` in one column; returns rows changed
    pub fn update_column_values(&self, table: &str, column: &str, from: &str, to: &str) -> Result<usize> {
        let known = self.select_all_column_names(table)?;
        self.ensure_columns(table, &known, &[column])?;
        let c = identifier::quote(column)?;
        let sql = format!("UPDATE {} SET {c} = ?1 WHERE {c} = ?2", identifier::quote(table)?);
        tracing::debug!("{}", sql);
        let changed = self.conn()?.execute(&sql, [to, from])?;
        Ok(changed)
    }

    /// Execute arbitrary SQL without reading results
    pub fn raw_query(&self, sql: &str) -> Result<()> {
        tracing::debug!("{}", sql);
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    // ========== Bulk Operations ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn()?.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn()?.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn()?.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let tables = self
            .list_tables()?
            .into_iter()
            .map(|t| -> Result<TableStats> {
                let rows = self.row_count(&t)?;
                let columns = self.table_columns(&t)?.len();
                Ok(TableStats { name: t, rows, columns })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(StoreStats { location: self.location.to_string(), tables })
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close store at {}: {}", self.location, e);
        }
    }
}

/// Per-table statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct TableStats {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub location: String,
    pub tables: Vec<TableStats>,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database Statistics ({}):", self.location)?;
        writeln!(f, "  Tables: {}", self.tables.len())?;
        for t in &self.tables {
            writeln!(f, "  {}: {} rows, {} columns", t.name, t.rows, t.columns)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .create_table(
                "sales",
                &[ColumnDef::new("region", ColumnType::Text), ColumnDef::new("amount", ColumnType::Integer)],
            )
            .unwrap();
        for (region, amount) in [("east", 10), ("west", 20), ("east", 30)] {
            store
                .insert("sales", &["region", "amount"], &[Value::Text(region.into()), Value::Integer(amount)])
                .unwrap();
        }
        store
    }

    #[test]
    fn test_select_tail() {
        let store = sales_store();

        let all = store.select("sales", &["amount"], None).unwrap();
        assert_eq!(all, vec![vec![Value::Integer(10)], vec![Value::Integer(20)], vec![Value::Integer(30)]]);

        let tail = store.select("sales", &["amount"], Some(2)).unwrap();
        assert_eq!(tail, vec![vec![Value::Integer(20)], vec![Value::Integer(30)]]);

        assert!(store.select("sales", &["amount"], Some(0)).unwrap().is_empty());
        assert_eq!(store.select("sales", &[], Some(10)).unwrap().len(), 3);
    }

    #[test]
    fn test_select_one_and_last() {
        let store = sales_store();
        let first = store.select_one("sales", &["region", "amount"]).unwrap().unwrap();
        assert_eq!(first, vec![Value::Text("east".into()), Value::Integer(10)]);

        let last = store.select_last("sales", &["region", "amount"]).unwrap();
        assert_eq!(last, vec![Value::Text("east".into()), Value::Integer(30)]);
    }

    #[test]
    fn test_select_last_empty_table() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("empty", &[ColumnDef::new("a", ColumnType::Text)]).unwrap();
        assert!(matches!(store.select_last("empty", &["a"]), Err(Error::EmptyResult { .. })));
        assert!(store.select_one("empty", &["a"]).unwrap().is_none());
    }

    #[test]
    fn test_distinct_and_column_names() {
        let store = sales_store();
        assert_eq!(store.select_all_column_names("sales").unwrap(), vec!["region", "amount"]);

        let mut regions: Vec<String> = store
            .select_distinct_column("region", "sales")
            .unwrap()
            .iter()
            .map(crate::storage::value::render)
            .collect();
        regions.sort();
        assert_eq!(regions, vec!["east", "west"]);
    }

    #[test]
    fn test_unknown_table_and_column() {
        let store = sales_store();
        assert!(matches!(store.select_all_column_names("nope"), Err(Error::UnknownTable(_))));
        assert!(matches!(store.select_all("nope"), Err(Error::UnknownTable(_))));
        assert!(matches!(
            store.select_distinct_column("price", "sales"),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_names_resolve_case_insensitively() {
        let store = sales_store();
        assert!(store.table_exists("SALES").unwrap());
        assert_eq!(store.row_count("Sales").unwrap(), 3);
        assert_eq!(store.select("sales", &["REGION"], Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_arity_mismatch() {
        let store = sales_store();
        let result = store.insert("sales", &["region", "amount"], &[Value::Text("north".into())]);
        assert!(matches!(result, Err(Error::ArityMismatch { expected: 2, found: 1 })));
        assert_eq!(store.row_count("sales").unwrap(), 3);
    }

    #[test]
    fn test_hostile_identifiers_are_quoted() {
        let store = Store::open_in_memory().unwrap();
        let table = "t\"; DROP TABLE other; --";
        store.raw_query("CREATE TABLE other (x TEXT)").unwrap();
        store.create_table(table, &[ColumnDef::new("a;b", ColumnType::Text)]).unwrap();
        store.insert(table, &["a;b"], &[Value::Text("v".into())]).unwrap();

        assert!(store.table_exists("other").unwrap());
        assert_eq!(store.select_all(table).unwrap(), vec![vec![Value::Text("v".into())]]);
    }

    #[test]
    fn test_update_column_values() {
        let store = sales_store();
        let changed = store.update_column_values("sales", "region", "east", "East").unwrap();
        assert_eq!(changed, 2);
        assert_eq!(store.select_distinct_column("region", "sales").unwrap().len(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut store = sales_store();
        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.select_all("sales"), Err(Error::StorageUnavailable(_))));
    }

    #[test]
    fn test_close_commits_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut store = Store::open(&path).unwrap();
        store.create_table("t", &[ColumnDef::new("a", ColumnType::Integer)]).unwrap();
        store.begin_transaction().unwrap();
        store.insert("t", &["a"], &[Value::Integer(1)]).unwrap();
        store.close().unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.row_count("t").unwrap(), 1);
    }

    #[test]
    fn test_open_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("store.db");
        assert!(matches!(Store::open(&path), Err(Error::StorageUnavailable(_))));
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(Location::parse(":memory:"), Location::InMemory);
        assert_eq!(Location::parse("data.db"), Location::File(PathBuf::from("data.db")));
        assert_eq!(Location::InMemory.to_string(), ":memory:");
    }

    #[test]
    fn test_stats() {
        let store = sales_store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.tables.len(), 1);
        assert_eq!(stats.tables[0].rows, 3);
        assert_eq!(stats.tables[0].columns, 2);
        assert!(stats.to_string().contains("sales: 3 rows"));
    }
}
