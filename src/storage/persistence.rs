//! Snapshot persistence for the table store

use crate::core::{StoreError, StoreResult};
use crate::storage::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub tables: HashMap<String, Table>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Unique per write, so two writes are told apart even when the file
    /// mtime did not move between them.
    pub write_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub row_count: usize,
    pub table_count: usize,
}

impl StoreSnapshot {
    pub fn new(tables: HashMap<String, Table>) -> Self {
        let row_count = tables.values().map(|t| t.row_count()).sum();
        let table_count = tables.len();

        Self {
            version: SNAPSHOT_VERSION,
            tables,
            metadata: SnapshotMetadata {
                write_id: Uuid::new_v4(),
                created_at: Utc::now(),
                row_count,
                table_count,
            },
        }
    }
}

/// Everything but the tables, for cheap change checks.
#[derive(Debug, Deserialize)]
pub struct SnapshotHeader {
    pub version: u32,
    pub metadata: SnapshotMetadata,
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Write the snapshot next to its target and rename it into place, so
    /// readers see either the old file or the new one.
    pub fn save(&self, snapshot: &StoreSnapshot) -> StoreResult<()> {
        let dir = match self.snapshot_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::IoError(format!("Failed to create snapshot directory: {}", e)))?;

        let serialized = rmp_serde::to_vec_named(snapshot)
            .map_err(|e| StoreError::Snapshot(format!("Failed to serialize snapshot: {}", e)))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StoreError::IoError(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&serialized)
            .map_err(|e| StoreError::IoError(format!("Failed to write snapshot: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StoreError::IoError(format!("Failed to sync snapshot: {}", e)))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| StoreError::IoError(format!("Failed to rename snapshot: {}", e.error)))?;
        Ok(())
    }

    pub fn load(&self) -> StoreResult<Option<StoreSnapshot>> {
        let Some(data) = self.read()? else {
            return Ok(None);
        };
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| StoreError::Snapshot(format!("Failed to deserialize snapshot: {}", e)))?;
        check_version(snapshot.version)?;
        Ok(Some(snapshot))
    }

    /// Decode only the version and metadata, skipping over the tables.
    pub fn load_header(&self) -> StoreResult<Option<SnapshotHeader>> {
        let Some(data) = self.read()? else {
            return Ok(None);
        };
        let header: SnapshotHeader = rmp_serde::from_slice(&data)
            .map_err(|e| StoreError::Snapshot(format!("Failed to deserialize snapshot header: {}", e)))?;
        check_version(header.version)?;
        Ok(Some(header))
    }

    fn read(&self) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(&self.snapshot_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::IoError(format!("Failed to read snapshot: {}", e))),
        }
    }

    /// Modification time of the snapshot file, `None` if it does not exist yet.
    pub fn modified(&self) -> StoreResult<Option<SystemTime>> {
        match fs::metadata(&self.snapshot_path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_version(version: u32) -> StoreResult<()> {
    if version != SNAPSHOT_VERSION {
        return Err(StoreError::Snapshot(format!(
            "Unsupported snapshot version {}",
            version
        )));
    }
    Ok(())
}
