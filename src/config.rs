use std::env;
use std::path::PathBuf;

use crate::core::{ReconError, Result};

pub const DEFAULT_SOURCE_PATTERN: &str = "cp7_data.csv";
pub const DEFAULT_SUCCESS_TABLE: &str = "codigo_postal_base";
pub const DEFAULT_ERROR_TABLE: &str = "codigo_postal_erro_404";
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 4;

/// Where the pipeline finds its tabular input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub dir: PathBuf,
    pub pattern: String,
    pub delimiter: u8,
}

/// Process-wide settings, read once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Only needed by `sync`; the read service runs without it.
    pub base_url: Option<String>,
    pub store_path: PathBuf,
    pub source: SourceConfig,
    pub lookup_concurrency: usize,
    pub success_table: String,
    pub error_table: String,
    pub serve_table: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// Blank values count as missing.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = var("BASE_URL");
        let store_path = var("STORE_PATH")
            .map(PathBuf::from)
            .ok_or(ReconError::ConfigurationMissing("STORE_PATH"))?;

        let source = SourceConfig {
            dir: var("SOURCE_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
            pattern: var("SOURCE_PATTERN").unwrap_or_else(|| DEFAULT_SOURCE_PATTERN.to_string()),
            delimiter: match var("SOURCE_DELIMITER") {
                Some(raw) => parse_delimiter(&raw)?,
                None => b',',
            },
        };

        let lookup_concurrency = match var("LOOKUP_CONCURRENCY") {
            Some(raw) => parse_concurrency(&raw)?,
            None => DEFAULT_LOOKUP_CONCURRENCY,
        };

        let success_table =
            var("SUCCESS_TABLE").unwrap_or_else(|| DEFAULT_SUCCESS_TABLE.to_string());
        let error_table = var("ERROR_TABLE").unwrap_or_else(|| DEFAULT_ERROR_TABLE.to_string());
        let serve_table = var("SERVE_TABLE").unwrap_or_else(|| success_table.clone());

        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("APP_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|err| ReconError::InvalidConfiguration {
                    name: "APP_PORT",
                    reason: err.to_string(),
                })?,
            None => 8080,
        };

        Ok(Self {
            base_url,
            store_path,
            source,
            lookup_concurrency,
            success_table,
            error_table,
            serve_table,
            host,
            port,
        })
    }

    pub fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or(ReconError::ConfigurationMissing("BASE_URL"))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    let raw = if raw == "\\t" { "\t" } else { raw };
    match raw.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(ReconError::InvalidConfiguration {
            name: "SOURCE_DELIMITER",
            reason: format!("expected a single byte, got {raw:?}"),
        }),
    }
}

fn parse_concurrency(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ReconError::InvalidConfiguration {
            name: "LOOKUP_CONCURRENCY",
            reason: "must be at least 1".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(err) => Err(ReconError::InvalidConfiguration {
            name: "LOOKUP_CONCURRENCY",
            reason: err.to_string(),
        }),
    }
}
