//! Repository handle and metadata

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use git2::{BranchType, Repository};
use serde::Serialize;

use crate::{Error, Result};

/// Metadata describing an acquired repository
///
/// A plain value record; external collaborators may persist a copy of
/// these fields keyed by an identifier of their own choosing.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryInfo {
    /// Derived short identifier
    pub name: String,
    /// Absolute, resolved on-disk location
    pub path: PathBuf,
    /// True when the source was not recognized as a remote URL
    pub is_local: bool,
    /// Branch the repository considers primary
    pub default_branch: String,
    /// Full hex identifier of the current head commit
    pub last_commit: String,
    /// Size of head's ancestry
    pub commit_count: usize,
    /// Number of local branches
    pub branch_count: usize,
}

/// Handle to a repository acquired through a [`WorkspaceStore`](crate::WorkspaceStore)
///
/// Returned by `acquire` and threaded through all subsequent calls, so any
/// number of repositories can be open at once without shared mutable
/// state. `last_commit` is the only metadata field that changes over the
/// handle's lifetime, when a branch switch moves the head.
pub struct RepositoryHandle {
    info: Mutex<RepositoryInfo>,
    mutate: Arc<Mutex<()>>,
}

impl fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("info", &self.info())
            .finish_non_exhaustive()
    }
}

impl RepositoryHandle {
    pub(crate) fn new(info: RepositoryInfo, mutate: Arc<Mutex<()>>) -> Self {
        Self {
            info: Mutex::new(info),
            mutate,
        }
    }

    /// A snapshot of the handle's metadata
    pub fn info(&self) -> RepositoryInfo {
        self.lock_info().clone()
    }

    /// The derived short name
    pub fn name(&self) -> String {
        self.lock_info().name.clone()
    }

    /// The absolute on-disk location
    pub fn path(&self) -> PathBuf {
        self.lock_info().path.clone()
    }

    /// True when the repository is caller-owned rather than a cached clone
    pub fn is_local(&self) -> bool {
        self.lock_info().is_local
    }

    /// The head commit the handle last observed
    pub fn last_commit(&self) -> String {
        self.lock_info().last_commit.clone()
    }

    pub(crate) fn update_last_commit(&self, commit: String) {
        self.lock_info().last_commit = commit;
    }

    /// Acquire the per-repository mutation region
    ///
    /// Held for the duration of any operation that touches the working
    /// tree or the head reference. Reads pinned to an explicit historical
    /// reference do not need it.
    pub(crate) fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the underlying git repository
    ///
    /// Fails with `NotFound` once the backing directory has been removed,
    /// so queries against a cleaned-up handle fail instead of observing
    /// stale state.
    pub(crate) fn open_repo(&self) -> Result<Repository> {
        let path = self.path();
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "repository is no longer on disk: {}",
                path.display()
            )));
        }
        Repository::open(&path)
            .map_err(|e| Error::Internal(format!("failed to open repository: {}", e)))
    }

    fn lock_info(&self) -> MutexGuard<'_, RepositoryInfo> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Facts read from a repository's current head
pub(crate) struct HeadState {
    pub default_branch: String,
    pub last_commit: String,
    pub commit_count: usize,
    pub branch_count: usize,
}

/// Inspect an open repository's head
///
/// The commit count walks the full ancestry from head, so this is
/// O(history size); callers with very large histories should treat the
/// value as expensive to produce.
pub(crate) fn head_state(repo: &Repository) -> Result<HeadState> {
    let head = repo
        .head()
        .map_err(|e| Error::Internal(format!("failed to read HEAD: {}", e)))?;
    if !head.is_branch() {
        return Err(Error::Conflict(
            "HEAD is detached; cannot determine the default branch".to_string(),
        ));
    }
    let default_branch = head
        .shorthand()
        .ok_or_else(|| Error::Internal("HEAD name is not valid UTF-8".to_string()))?
        .to_string();

    let head_commit = head
        .peel_to_commit()
        .map_err(|e| Error::Internal(format!("failed to resolve HEAD commit: {}", e)))?;
    let last_commit = head_commit.id().to_string();

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| Error::Internal(format!("failed to start history walk: {}", e)))?;
    revwalk
        .push(head_commit.id())
        .map_err(|e| Error::Internal(format!("failed to start history walk: {}", e)))?;
    let mut commit_count = 0;
    for oid in revwalk {
        oid.map_err(|e| Error::Internal(format!("history walk failed: {}", e)))?;
        commit_count += 1;
    }

    let branch_count = repo
        .branches(Some(BranchType::Local))
        .map_err(|e| Error::Internal(format!("failed to list branches: {}", e)))?
        .count();

    Ok(HeadState {
        default_branch,
        last_commit,
        commit_count,
        branch_count,
    })
}

/// Open a repository rooted exactly at `path`, rejecting bare repositories
pub(crate) fn open_non_bare(path: &Path) -> Result<Repository> {
    let repo = Repository::open(path).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            Error::Conflict(format!("{} is not a git repository", path.display()))
        } else {
            Error::Internal(format!("failed to open repository: {}", e))
        }
    })?;
    if repo.is_bare() {
        return Err(Error::Conflict(format!(
            "{} is a bare repository",
            path.display()
        )));
    }
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_head_state_counts() {
        let dir = TempDir::new().unwrap();
        let repo = testutil::init_repo(dir.path());
        testutil::commit_file(&repo, "a.txt", "one", "first");
        testutil::commit_file(&repo, "b.txt", "two", "second");

        let state = head_state(&repo).unwrap();
        assert_eq!(state.commit_count, 2);
        assert_eq!(state.branch_count, 1);
        assert_eq!(state.last_commit.len(), 40);
    }

    #[test]
    fn test_open_non_bare_rejects_bare() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init_bare(dir.path()).unwrap();

        let err = open_non_bare(dir.path()).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[test]
    fn test_open_non_bare_rejects_plain_directory() {
        let dir = TempDir::new().unwrap();
        let err = open_non_bare(dir.path()).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[test]
    fn test_query_after_backing_directory_removed() {
        let dir = TempDir::new().unwrap();
        let repo = testutil::init_repo(&dir.path().join("repo"));
        testutil::commit_file(&repo, "a.txt", "one", "first");
        let path = repo.workdir().unwrap().to_path_buf();

        let state = head_state(&repo).unwrap();
        let handle = RepositoryHandle::new(
            RepositoryInfo {
                name: "repo".to_string(),
                path: path.clone(),
                is_local: true,
                default_branch: state.default_branch,
                last_commit: state.last_commit,
                commit_count: state.commit_count,
                branch_count: state.branch_count,
            },
            Arc::new(Mutex::new(())),
        );
        drop(repo);

        std::fs::remove_dir_all(&path).unwrap();
        let err = handle.open_repo().err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }
}
