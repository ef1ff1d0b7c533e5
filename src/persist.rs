//! Full-replace batch writes to named destinations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::core::{Row, StoreResult};
use crate::storage::TableStore;

/// Rows bound for one destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableBatch {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TableBatch {
    pub fn new<S: AsRef<str>>(columns: &[S], rows: Vec<Row>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Storage that can swap a table's content for a new batch.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Replace everything in `table` with `batch`; returns the rows written.
    async fn replace_table(&self, table: &str, batch: TableBatch) -> StoreResult<usize>;
}

#[async_trait]
impl RecordSink for TableStore {
    async fn replace_table(&self, table: &str, batch: TableBatch) -> StoreResult<usize> {
        TableStore::replace_table(self, table, batch.columns, batch.rows).await
    }
}

/// What happened to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistStatus {
    Written { rows: usize },
    /// Empty batch: the destination was left as it was.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    #[serde(flatten)]
    pub status: PersistStatus,
}

pub struct BatchPersister {
    sink: Arc<dyn RecordSink>,
}

impl BatchPersister {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }

    /// Write one batch. An empty batch does not touch the destination, so a
    /// previous run's rows survive a run that produced none.
    pub async fn persist(&self, table: &str, batch: TableBatch) -> TableReport {
        let status = if batch.is_empty() {
            info!(table, "empty batch, destination left unchanged");
            PersistStatus::Skipped
        } else {
            match self.sink.replace_table(table, batch).await {
                Ok(rows) => {
                    info!(table, rows, "destination replaced");
                    PersistStatus::Written { rows }
                }
                Err(err) => {
                    error!(table, error = %err, "failed to write destination");
                    PersistStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        };

        TableReport {
            table: table.to_string(),
            status,
        }
    }

    /// Write every batch in order. A failed destination does not stop the
    /// ones after it.
    pub async fn persist_all<I>(&self, batches: I) -> Vec<TableReport>
    where
        I: IntoIterator<Item = (String, TableBatch)>,
    {
        let mut reports = Vec::new();
        for (table, batch) in batches {
            reports.push(self.persist(&table, batch).await);
        }
        reports
    }
}
