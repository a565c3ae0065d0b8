//! Branch switching
//!
//! Checking out a branch mutates the working tree, so it holds the
//! per-repository mutation region for its full duration and serializes
//! with acquire's update-in-place and with head-relative reads.

use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode};

use super::handle::RepositoryHandle;
use crate::{Error, Result};

impl RepositoryHandle {
    /// Check out the named local branch
    ///
    /// Fails with `NotFound` when the branch does not exist and with
    /// `Conflict` when the checkout would discard uncommitted local
    /// modifications; in both cases the working tree is left as it was.
    /// On success the handle's `last_commit` moves to the new head.
    pub fn switch_branch(&self, name: &str) -> Result<()> {
        let _guard = self.lock_mutation();
        let repo = self.open_repo()?;

        let branch = repo.find_branch(name, BranchType::Local).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::NotFound(format!("branch '{}' not found", name))
            } else {
                Error::Internal(format!("failed to look up branch '{}': {}", name, e))
            }
        })?;
        let commit = branch.get().peel_to_commit().map_err(|e| {
            Error::Internal(format!("failed to resolve branch '{}': {}", name, e))
        })?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(|e| {
                if e.code() == ErrorCode::Conflict {
                    Error::Conflict(format!(
                        "checking out '{}' would discard uncommitted local modifications",
                        name
                    ))
                } else {
                    Error::Internal(format!("checkout of '{}' failed: {}", name, e))
                }
            })?;
        repo.set_head(&format!("refs/heads/{}", name))
            .map_err(|e| Error::Internal(format!("failed to move HEAD to '{}': {}", name, e)))?;

        self.update_last_commit(commit.id().to_string());
        tracing::info!(branch = name, commit = %commit.id(), "switched branch");
        Ok(())
    }
}
