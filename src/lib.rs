// ============================================================================
// cp7-recon Library
// ============================================================================

pub mod classify;
pub mod config;
pub mod core;
pub mod import;
pub mod lookup;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod storage;
pub mod web;

// Re-export main types for convenience
pub use classify::OutcomeBuckets;
pub use config::AppConfig;
pub use crate::core::{ReconError, Result, StoreError, Value};
pub use lookup::{HttpLookupClient, LocalityMatch, LookupOutcome, PostalLookup};
pub use normalize::{CanonicalKey, normalize};
pub use persist::{BatchPersister, PersistStatus, RecordSink, TableBatch, TableReport};
pub use pipeline::{Reconciler, RunSummary};
pub use record::ReconciledRecord;
pub use storage::TableStore;
