//! # Datapyler - CSV dataset loading and value normalization
//!
//! Datapyler loads delimited text files into a local SQLite database and
//! helps pick a canonical set of values for messy columns.
//!
//! Datapyler provides:
//! - SQLite-backed store with table-parameterized select/insert primitives
//! - CSV ingest with schema inference and lossless single-byte decoding
//! - Per-column distinct value discovery
//! - Value mappings applied as bulk column rewrites
//! - Row-per-line CSV export

pub mod identifier;
pub mod storage;
pub mod ingest;
pub mod normalize;
pub mod session;
pub mod export;
pub mod ui;
pub mod output;
pub mod config;

// Re-exports for convenient access
pub use storage::{Store, Location, Row, ColumnDef, ColumnType};
pub use ingest::{IngestOptions, LoadReport};
pub use normalize::ValueMapping;
pub use session::{Session, SessionState};

/// Result type alias for Datapyler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Datapyler operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("File not found or unreadable: {0}")]
    NotFound(String),

    #[error("Table '{table}' has no rows")]
    EmptyResult { table: String },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Expected {expected} values, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Table '{table}' has no column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("Input has no header row: {0}")]
    EmptyInput(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}
