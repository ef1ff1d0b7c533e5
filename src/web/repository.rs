use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::StoreResult;
use crate::record::{BASELINE_KEY, CLEAN_KEY, ReconciledRecord};
use crate::storage::TableStore;

/// Read access to the reconciled postal codes.
#[async_trait]
pub trait PostalCodeRepository: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<ReconciledRecord>>;
    async fn find_by_clean_key(&self, key: &str) -> StoreResult<Option<ReconciledRecord>>;
    async fn find_by_baseline_key(&self, key: &str) -> StoreResult<Option<ReconciledRecord>>;
}

/// Outcome of resolving a key against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ReconciledRecord),
    NotFound,
}

/// Try the clean key first, then the baseline key. First hit wins.
pub async fn resolve(repo: &dyn PostalCodeRepository, key: &str) -> StoreResult<Resolution> {
    if let Some(record) = repo.find_by_clean_key(key).await? {
        return Ok(Resolution::Resolved(record));
    }
    if let Some(record) = repo.find_by_baseline_key(key).await? {
        debug!(key, "resolved by baseline key");
        return Ok(Resolution::Resolved(record));
    }
    Ok(Resolution::NotFound)
}

/// [`PostalCodeRepository`] over one table of a [`TableStore`].
///
/// Every read first picks up a newer snapshot if one was written by another
/// process.
pub struct StoreRepository {
    store: Arc<TableStore>,
    table: String,
}

impl StoreRepository {
    pub fn new(store: Arc<TableStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    async fn find_by(&self, column: &str, key: &str) -> StoreResult<Option<ReconciledRecord>> {
        self.store.refresh().await?;
        let Some(table) = self.store.table(&self.table).await else {
            return Ok(None);
        };
        table
            .find_first(column, key)?
            .map(|row| ReconciledRecord::from_row(&table, row))
            .transpose()
    }
}

#[async_trait]
impl PostalCodeRepository for StoreRepository {
    async fn list(&self) -> StoreResult<Vec<ReconciledRecord>> {
        self.store.refresh().await?;
        let Some(table) = self.store.table(&self.table).await else {
            return Ok(Vec::new());
        };
        table
            .rows()
            .iter()
            .map(|row| ReconciledRecord::from_row(&table, row))
            .collect()
    }

    async fn find_by_clean_key(&self, key: &str) -> StoreResult<Option<ReconciledRecord>> {
        self.find_by(CLEAN_KEY, key).await
    }

    async fn find_by_baseline_key(&self, key: &str) -> StoreResult<Option<ReconciledRecord>> {
        self.find_by(BASELINE_KEY, key).await
    }
}
