//! Conversions between CSV text fields and SQLite values

use rusqlite::types::Value;
use super::schema::ColumnType;

/// A row of values in the column order it was requested
pub type Row = Vec<Value>;

/// Convert a decoded CSV field into a value for a column of the given type.
///
/// Empty fields become NULL. A field that does not parse as the column's
/// numeric type is kept as text, which SQLite stores as-is.
pub fn parse_field(field: &str, ty: ColumnType) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    match ty {
        ColumnType::Integer => field
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(field.to_string())),
        ColumnType::Real => field
            .parse::<f64>()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(field.to_string())),
        ColumnType::Text => Value::Text(field.to_string()),
    }
}

/// Render a value as a CSV field / display cell.
///
/// Reals always keep a fractional part or exponent (`1.0`, not `1`) so a
/// re-read infers REAL again.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => format!("{:?}", r),
        Value::Text(s) => s.clone(),
        Value::Blob(bytes) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
    }
}

/// Render a value as JSON.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(r) => serde_json::Value::from(*r),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Blob(_) => serde_json::Value::from(render(value)),
    }
}
