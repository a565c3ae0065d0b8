//! Pointer records for caller-owned repositories
//!
//! A local repository is registered in the workspace root under its
//! derived name without copying or taking ownership of its directory: the
//! entry is a small TOML record mapping the name to the real path.
//! Symlinks would serve the same purpose but are not available on every
//! filesystem, so the record is an ordinary file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name-to-path mapping stored in the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRecord {
    /// Source string the record was created from
    pub source: String,
    /// Absolute path of the externally owned repository
    pub path: PathBuf,
}

impl PointerRecord {
    /// Create a record for a resolved local repository
    pub fn new(source: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
        }
    }

    /// Load a record from its file in the workspace root
    pub fn load(record_path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(record_path).map_err(|e| {
            Error::Internal(format!(
                "failed to read pointer record {}: {}",
                record_path.display(),
                e
            ))
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::Conflict(format!(
                "malformed pointer record {}: {}",
                record_path.display(),
                e
            ))
        })
    }

    /// Write the record to its file in the workspace root
    pub fn save(&self, record_path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| {
            Error::Internal(format!("failed to serialize pointer record: {}", e))
        })?;
        fs::write(record_path, contents).map_err(|e| {
            Error::Internal(format!(
                "failed to write pointer record {}: {}",
                record_path.display(),
                e
            ))
        })
    }
}
