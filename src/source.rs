//! Tabular source loading.
//!
//! A source is a delimited text file with a header row. It is located by a
//! glob pattern relative to a base directory and loaded whole into memory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::core::{ReconError, Result};

/// Header of the postal code column in the input file.
pub const SOURCE_CODE_COLUMN: &str = "CP7";
/// Name the postal code column is known by after loading.
pub const CODE_COLUMN: &str = "CP";

/// An in-memory table of named string fields.
///
/// Short rows are padded with empty cells so every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SourceTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let idx = self
            .column_index(from)
            .ok_or_else(|| ReconError::MissingColumn(from.to_string()))?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ReconError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }
}

/// Resolve `pattern` under `dir` to a single file.
///
/// When several files match, the lexicographically smallest path wins so the
/// choice does not depend on directory listing order.
pub fn resolve_source(dir: &Path, pattern: &str) -> Result<PathBuf> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let full = Path::new(&base).join(pattern);
    let full = full.to_string_lossy();

    let paths = glob::glob(&full).map_err(|err| ReconError::InvalidPattern {
        pattern: full.to_string(),
        reason: err.to_string(),
    })?;

    let mut matches: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "skipping unreadable source candidate");
                None
            }
        })
        .collect();
    matches.sort();

    let Some(first) = matches.first().cloned() else {
        return Err(ReconError::SourceNotFound(full.to_string()));
    };

    if matches.len() > 1 {
        warn!(
            pattern = %full,
            candidates = matches.len(),
            chosen = %first.display(),
            "multiple source files match, using the first in path order"
        );
    }

    Ok(first)
}

/// Load a delimited file with a header row.
pub fn load_table(path: &Path, delimiter: u8) -> Result<SourceTable> {
    let read_err = |source: csv::Error| ReconError::SourceRead {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(read_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(path = %path.display(), rows = rows.len(), columns = columns.len(), "source loaded");
    Ok(SourceTable::new(columns, rows))
}

/// Locate the configured source and load it.
pub fn read_source(config: &SourceConfig) -> Result<(PathBuf, SourceTable)> {
    let path = resolve_source(&config.dir, &config.pattern)?;
    let table = load_table(&path, config.delimiter)?;
    Ok((path, table))
}
