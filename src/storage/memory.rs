use super::Table;
use super::persistence::{SnapshotManager, StoreSnapshot};
use crate::core::{Row, StoreResult};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Coarsest mtime resolution we expect from a filesystem (FAT records two
/// seconds). A snapshot whose mtime is closer than this to the moment it was
/// last checked may have been rewritten without its mtime moving.
const MTIME_GRANULARITY: Duration = Duration::from_secs(2);

/// Identity of the snapshot file the in-memory tables were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SnapshotStamp {
    modified: SystemTime,
    write_id: Uuid,
}

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    /// `None` while no snapshot file exists.
    stamp: Option<SnapshotStamp>,
    /// When `stamp` was last confirmed against the file.
    verified_at: Option<SystemTime>,
}

impl StoreState {
    /// True when the file's mtime alone proves it has not changed.
    fn settled(&self, current: Option<SystemTime>) -> bool {
        match (self.stamp, current, self.verified_at) {
            (None, None, _) => true,
            (Some(stamp), Some(modified), Some(verified)) => {
                stamp.modified == modified
                    && modified
                        .checked_add(MTIME_GRANULARITY)
                        .is_some_and(|limit| verified > limit)
            }
            _ => false,
        }
    }
}

/// Named tables with full-replace writes.
///
/// A store opened on a path keeps a snapshot file in sync with every write.
/// Other processes may write the same file: every write and every
/// [`refresh`] first picks up their tables, so a write only ever changes the
/// table it names.
///
/// [`refresh`]: TableStore::refresh
pub struct TableStore {
    state: RwLock<StoreState>,
    snapshot: Option<SnapshotManager>,
}

impl TableStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot: None,
        }
    }

    /// Open a snapshot-backed store, loading the snapshot if it exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let manager = SnapshotManager::new(path);
        let mut state = StoreState::default();
        sync_with_snapshot(&mut state, &manager)?;

        info!(
            path = %manager.path().display(),
            tables = state.tables.len(),
            "table store opened"
        );
        for table in state.tables.values() {
            debug!(
                table = table.name(),
                rows = table.row_count(),
                replaced_at = %table.replaced_at(),
                "table loaded"
            );
        }

        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(manager),
        })
    }

    /// Replace the whole content of `name`, creating it if needed.
    ///
    /// The in-memory tables only change once the snapshot is on disk, so a
    /// failed write leaves the previous content in place.
    pub async fn replace_table(&self, name: &str, columns: Vec<String>, rows: Vec<Row>) -> StoreResult<usize> {
        let table = Table::new(name, columns, rows)?;
        let written = table.row_count();

        let mut state = self.state.write().await;

        if let Some(manager) = &self.snapshot {
            if sync_with_snapshot(&mut state, manager)? {
                info!(table = name, "picked up tables written by another process before replacing");
            }
        }

        // Copy-on-write: the live map is swapped only after a successful save
        let mut next = state.tables.clone();
        next.insert(name.to_string(), table);

        if let Some(manager) = &self.snapshot {
            let checked_at = SystemTime::now();
            let snapshot = StoreSnapshot::new(next.clone());
            let write_id = snapshot.metadata.write_id;
            manager.save(&snapshot)?;
            state.stamp = Some(SnapshotStamp {
                modified: manager.modified()?.unwrap_or(SystemTime::UNIX_EPOCH),
                write_id,
            });
            state.verified_at = Some(checked_at);
        }
        state.tables = next;

        debug!(table = name, rows = written, "table replaced");
        Ok(written)
    }

    pub async fn table(&self, name: &str) -> Option<Table> {
        self.state.read().await.tables.get(name).cloned()
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().await.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// First row of `table` whose `column` equals `needle`.
    ///
    /// A table that does not exist has no rows.
    pub async fn find_first(&self, table: &str, column: &str, needle: &str) -> StoreResult<Option<Row>> {
        let state = self.state.read().await;
        match state.tables.get(table) {
            Some(t) => Ok(t.find_first(column, needle)?.cloned()),
            None => Ok(None),
        }
    }

    /// Reload from the snapshot if it changed on disk since it was last seen.
    ///
    /// Returns `true` when the tables were reloaded.
    pub async fn refresh(&self) -> StoreResult<bool> {
        let Some(manager) = &self.snapshot else {
            return Ok(false);
        };

        let current = manager.modified()?;
        if self.state.read().await.settled(current) {
            return Ok(false);
        }

        let mut state = self.state.write().await;
        let reloaded = sync_with_snapshot(&mut state, manager)?;
        if reloaded {
            info!(tables = state.tables.len(), "table store reloaded from snapshot");
        }
        Ok(reloaded)
    }
}

/// Bring `state` in line with the snapshot file. Returns `true` when the
/// tables were reloaded.
///
/// The mtime is the fast check. While it is too recent to be trusted, the
/// snapshot's write id decides.
fn sync_with_snapshot(state: &mut StoreState, manager: &SnapshotManager) -> StoreResult<bool> {
    let checked_at = SystemTime::now();
    let current = manager.modified()?;
    if state.settled(current) {
        return Ok(false);
    }

    let unchanged = match (state.stamp, current) {
        (Some(stamp), Some(modified)) if stamp.modified == modified => manager
            .load_header()?
            .is_some_and(|header| header.metadata.write_id == stamp.write_id),
        _ => false,
    };

    if !unchanged {
        // mtime is read before the content: a write in between leaves a
        // stale mtime behind, which forces another reload next time
        let snapshot = manager.load()?;
        state.stamp = snapshot.as_ref().map(|snapshot| SnapshotStamp {
            modified: current.unwrap_or(SystemTime::UNIX_EPOCH),
            write_id: snapshot.metadata.write_id,
        });
        state.tables = snapshot.map(|snapshot| snapshot.tables).unwrap_or_default();
    }

    state.verified_at = Some(checked_at);
    Ok(!unchanged)
}
