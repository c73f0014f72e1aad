//! Storage Layer - SQLite-backed persistence
//!
//! One database file (or in-memory instance) holding any number of loaded
//! tables. Every operation names its table explicitly.

pub mod schema;
pub mod sqlite;
pub mod value;

pub use schema::{ColumnDef, ColumnType};
pub use sqlite::{Location, Store, StoreStats};
pub use value::Row;
