use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Row, StoreError, StoreResult, Value};

/// A named table of text cells, replaced wholesale on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    replaced_at: DateTime<Utc>,
}

impl Table {
    /// Build a table, checking every row has one value per column.
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> StoreResult<Self> {
        let name = name.into();
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(StoreError::RowWidth {
                table: name,
                row: idx,
                found: row.len(),
                expected: columns.len(),
            });
        }

        Ok(Self {
            name,
            columns,
            rows,
            replaced_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn replaced_at(&self) -> DateTime<Utc> {
        self.replaced_at
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First row, in insertion order, whose `column` equals `needle`.
    pub fn find_first(&self, column: &str, needle: &str) -> StoreResult<Option<&Row>> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| StoreError::ColumnNotFound(column.to_string(), self.name.clone()))?;
        Ok(self
            .rows
            .iter()
            .find(|row| row.get(idx).is_some_and(|v: &Value| v.matches(needle))))
    }
}
