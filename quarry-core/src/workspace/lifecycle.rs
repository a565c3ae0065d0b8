//! Removal of cached clones
//!
//! Only ephemeral clones — entries created for remote sources — are ever
//! deleted. A local handle's directory belongs to the caller; at most its
//! pointer record is dropped from the workspace root.

use std::fs;

use crate::repo::RepositoryHandle;
use crate::workspace::store::WorkspaceStore;
use crate::{Error, Result};

impl WorkspaceStore {
    /// Remove the workspace entry behind `handle`
    ///
    /// Idempotent: an entry that was already removed, or never
    /// materialized, is a no-op rather than a failure. Subsequent queries
    /// against a cleaned-up remote handle fail with `NotFound`.
    pub fn cleanup(&self, handle: &RepositoryHandle) -> Result<()> {
        let _guard = handle.lock_mutation();

        if handle.is_local() {
            let record_path = self.root().join(handle.name());
            if record_path.is_file() {
                fs::remove_file(&record_path).map_err(|e| {
                    Error::Internal(format!(
                        "failed to remove pointer record {}: {}",
                        record_path.display(),
                        e
                    ))
                })?;
                tracing::info!(name = %handle.name(), "removed pointer record");
            }
            return Ok(());
        }

        let path = handle.path();
        if !path.starts_with(self.root()) {
            return Err(Error::Internal(format!(
                "refusing to remove {} outside the workspace root",
                path.display()
            )));
        }
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| {
                Error::Internal(format!(
                    "failed to remove cached clone {}: {}",
                    path.display(),
                    e
                ))
            })?;
            tracing::info!(name = %handle.name(), path = %path.display(), "removed cached clone");
        }
        Ok(())
    }
}
