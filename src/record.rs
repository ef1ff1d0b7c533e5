use serde::{Deserialize, Serialize};

use crate::core::{Row, StoreError, StoreResult, Value};
use crate::storage::Table;

pub const CLEAN_KEY: &str = "codigo_postal_clean";
pub const BASELINE_KEY: &str = "codigo_postal_baseline";
pub const LOCALITY: &str = "concelho";
pub const REGION: &str = "distrito";

/// Column layout of the success table.
pub const SUCCESS_COLUMNS: [&str; 4] = [CLEAN_KEY, BASELINE_KEY, LOCALITY, REGION];
/// Column layout of the not-found table.
pub const ERROR_COLUMNS: [&str; 2] = [CLEAN_KEY, BASELINE_KEY];

/// A reconciled postal code as exposed by the read service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub codigo_postal_clean: Option<String>,
    pub codigo_postal_baseline: Option<String>,
    pub concelho: String,
    pub distrito: String,
}

impl ReconciledRecord {
    pub fn into_row(self) -> Row {
        vec![
            Value::from(self.codigo_postal_clean),
            Value::from(self.codigo_postal_baseline),
            Value::Text(self.concelho),
            Value::Text(self.distrito),
        ]
    }

    /// Decode one row of `table`. Columns are looked up by name, so extra
    /// columns and other orderings are fine.
    pub fn from_row(table: &Table, row: &Row) -> StoreResult<Self> {
        let cell = |column: &str| -> StoreResult<Value> {
            let idx = table.column_index(column).ok_or_else(|| {
                StoreError::ColumnNotFound(column.to_string(), table.name().to_string())
            })?;
            Ok(row.get(idx).cloned().unwrap_or(Value::Null))
        };
        let required = |column: &str| -> StoreResult<String> {
            match cell(column)? {
                Value::Text(s) => Ok(s),
                Value::Null => Err(StoreError::Decode(format!(
                    "'{column}' is NULL in table '{}'",
                    table.name()
                ))),
            }
        };

        Ok(Self {
            codigo_postal_clean: cell(CLEAN_KEY)?.as_text().map(str::to_string),
            codigo_postal_baseline: cell(BASELINE_KEY)?.as_text().map(str::to_string),
            concelho: required(LOCALITY)?,
            distrito: required(REGION)?,
        })
    }
}
