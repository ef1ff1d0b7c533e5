//! The reconciliation run: read, normalize, look up, classify, persist.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::classify::OutcomeBuckets;
use crate::config::{AppConfig, SourceConfig};
use crate::core::Result;
use crate::lookup::{LookupOutcome, PostalLookup};
use crate::normalize::{CanonicalKey, normalize};
use crate::persist::{BatchPersister, RecordSink, TableReport};
use crate::source::{CODE_COLUMN, SOURCE_CODE_COLUMN, read_source};

/// Counts and per-destination results of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub source: PathBuf,
    pub records: usize,
    pub found: usize,
    pub not_found: usize,
    pub other_errors: usize,
    pub tables: Vec<TableReport>,
}

pub struct Reconciler {
    source: SourceConfig,
    concurrency: usize,
    success_table: String,
    error_table: String,
    lookup: Arc<dyn PostalLookup>,
    persister: BatchPersister,
}

impl Reconciler {
    pub fn new(config: &AppConfig, lookup: Arc<dyn PostalLookup>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            source: config.source.clone(),
            concurrency: config.lookup_concurrency.max(1),
            success_table: config.success_table.clone(),
            error_table: config.error_table.clone(),
            lookup,
            persister: BatchPersister::new(sink),
        }
    }

    /// Run the pipeline once.
    ///
    /// Only a missing or unreadable source fails the run. Per-key lookup
    /// failures and per-table write failures end up in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id)
            .instrument(info_span!("reconcile", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunSummary> {
        let (path, mut table) = read_source(&self.source)?;
        table.rename_column(SOURCE_CODE_COLUMN, CODE_COLUMN)?;

        let keys: Vec<CanonicalKey> = table
            .column_values(CODE_COLUMN)?
            .into_iter()
            .map(normalize)
            .inspect(|key| {
                if !key.is_well_formed() {
                    warn!(key = %key, "postal code is not seven digits, looking it up anyway");
                }
            })
            .collect();

        info!(
            source = %path.display(),
            records = keys.len(),
            concurrency = self.concurrency,
            "reconciliation started"
        );

        let outcomes = self.lookup_all(keys).await;
        let buckets = OutcomeBuckets::classify(outcomes);

        info!(
            found = buckets.found.len(),
            not_found = buckets.not_found.len(),
            other_errors = buckets.other.len(),
            "lookups classified"
        );

        let tables = self
            .persister
            .persist_all([
                (self.success_table.clone(), buckets.success_batch()),
                (self.error_table.clone(), buckets.error_batch()),
            ])
            .await;

        info!("reconciliation finished");

        Ok(RunSummary {
            run_id,
            source: path,
            records: buckets.total(),
            found: buckets.found.len(),
            not_found: buckets.not_found.len(),
            other_errors: buckets.other.len(),
            tables,
        })
    }

    /// Look up every key, at most `concurrency` at a time. Results come back
    /// in input order whatever order the responses arrive in.
    async fn lookup_all(&self, keys: Vec<CanonicalKey>) -> Vec<LookupOutcome> {
        let lookup = self.lookup.as_ref();
        stream::iter(keys)
            .map(|key| async move { lookup.lookup(&key).await })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
