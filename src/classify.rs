//! Partitioning of lookup outcomes into persistable buckets.

use tracing::{error, warn};

use crate::core::Value;
use crate::lookup::{LocalityMatch, LookupOutcome};
use crate::normalize::CanonicalKey;
use crate::persist::TableBatch;
use crate::record::{ERROR_COLUMNS, ReconciledRecord, SUCCESS_COLUMNS};

/// A lookup that ended in neither a match nor a not-found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLookup {
    pub key: CanonicalKey,
    pub status: Option<u16>,
}

/// Outcomes split by variant, each bucket in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeBuckets {
    pub found: Vec<LocalityMatch>,
    pub not_found: Vec<CanonicalKey>,
    pub other: Vec<FailedLookup>,
}

impl OutcomeBuckets {
    pub fn classify<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = LookupOutcome>,
    {
        let mut buckets = Self::default();
        for outcome in outcomes {
            match outcome {
                LookupOutcome::Found(found) => buckets.found.push(found),
                LookupOutcome::NotFound { key } => {
                    warn!(key = %key, status = 404, "postal code not found");
                    buckets.not_found.push(key);
                }
                LookupOutcome::OtherError { key, status } => {
                    match status {
                        Some(status) => error!(key = %key, status, "postal code lookup failed"),
                        None => error!(key = %key, "postal code lookup failed without a response"),
                    }
                    buckets.other.push(FailedLookup { key, status });
                }
            }
        }
        buckets
    }

    pub fn total(&self) -> usize {
        self.found.len() + self.not_found.len() + self.other.len()
    }

    /// Rows for the success table. The clean key is left unset: matching it
    /// to a local code happens downstream.
    pub fn success_batch(&self) -> TableBatch {
        let rows = self
            .found
            .iter()
            .map(|found| {
                ReconciledRecord {
                    codigo_postal_clean: None,
                    codigo_postal_baseline: Some(found.baseline_key.clone()),
                    concelho: found.locality.clone(),
                    distrito: found.region.clone(),
                }
                .into_row()
            })
            .collect();
        TableBatch::new(&SUCCESS_COLUMNS, rows)
    }

    /// Rows for the not-found table, keyed by the code that was queried.
    pub fn error_batch(&self) -> TableBatch {
        let rows = self
            .not_found
            .iter()
            .map(|key| vec![Value::text(key.as_str()), Value::Null])
            .collect();
        TableBatch::new(&ERROR_COLUMNS, rows)
    }
}
