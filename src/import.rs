use std::path::Path;

use tracing::info;

use crate::core::{Result, Value};
use crate::persist::{BatchPersister, TableBatch, TableReport};
use crate::source::{SourceTable, load_table};

/// Convert a loaded source into a batch. Empty cells become `NULL`.
pub fn source_batch(table: &SourceTable) -> TableBatch {
    let rows = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|cell| Value::from_cell(cell)).collect())
        .collect();
    TableBatch::new(table.columns(), rows)
}

/// Load a tabular file into `table`, replacing what was there.
///
/// Same policy as the reconciliation tables: an empty file leaves the
/// destination alone.
pub async fn import_table(
    path: &Path,
    delimiter: u8,
    table: &str,
    persister: &BatchPersister,
) -> Result<TableReport> {
    let source = load_table(path, delimiter)?;
    info!(
        path = %path.display(),
        table,
        rows = source.row_count(),
        "importing table"
    );
    Ok(persister.persist(table, source_batch(&source)).await)
}
