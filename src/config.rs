use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Padlock";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Refuse import sources larger than this (100MB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Ceiling on PBKDF2 rounds accepted from a container header.
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "vault_import=info,warn"
}

/// Where the CSV sample template is written by default: the user's download
/// directory, or the working directory when there is none.
pub fn default_sample_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Tunables of the import pipeline. Every field has a default, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_file_size: u64,
    /// Treat the first row of delimited text as a header.
    pub csv_has_headers: bool,
    pub tag_separator: char,
    /// Rows sampled for column inference and the preview.
    pub sample_rows: usize,
    pub max_kdf_iterations: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            csv_has_headers: true,
            tag_separator: ',',
            sample_rows: 5,
            max_kdf_iterations: MAX_KDF_ITERATIONS,
        }
    }
}

impl ImportConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Import config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("max_file_size must be positive".into()));
        }
        if self.max_kdf_iterations == 0 {
            return Err(ConfigError::Invalid("max_kdf_iterations must be positive".into()));
        }
        if self.tag_separator.is_whitespace() || self.tag_separator == '"' {
            return Err(ConfigError::Invalid(format!(
                "tag_separator {:?} is not usable",
                self.tag_separator
            )));
        }
        Ok(())
    }
}
