use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell in a stored table.
///
/// Reconciled tables only ever hold postal codes and place names, so the
/// store keeps text and SQL-style `NULL` and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
}

pub type Row = Vec<Value>;

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Empty cells coming from a tabular source are stored as `NULL`.
    pub fn from_cell(cell: &str) -> Self {
        if cell.is_empty() {
            Value::Null
        } else {
            Value::Text(cell.to_string())
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL equality: `NULL` never matches anything.
    pub fn matches(&self, needle: &str) -> bool {
        matches!(self, Value::Text(s) if s == needle)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Value::Null, Value::Text)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cell_is_null() {
        assert_eq!(Value::from_cell(""), Value::Null);
        assert_eq!(Value::from_cell("Lisboa"), Value::text("Lisboa"));
    }

    #[test]
    fn test_null_never_matches() {
        assert!(!Value::Null.matches(""));
        assert!(!Value::Null.matches("NULL"));
        assert!(Value::text("1000100").matches("1000100"));
        assert!(!Value::text("1000100").matches("1000-100"));
    }
}
