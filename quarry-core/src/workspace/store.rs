//! Workspace store: clone-or-update acquisition of repositories
//!
//! The store owns one persistent root directory with a single entry per
//! repository identity, named by the derived short name. Remote entries
//! are full clones that are updated in place on re-acquisition rather
//! than re-cloned; local entries are pointer records referencing a
//! directory the store does not own.
//!
//! Every operation that mutates a repository's working tree runs inside a
//! mutual-exclusion region keyed by the canonical workspace path, so
//! concurrent acquisitions of the same identity serialize while distinct
//! identities proceed in parallel.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{ErrorCode, FetchOptions, RemoteCallbacks, Repository};

use crate::repo::{head_state, open_non_bare, RepositoryHandle, RepositoryInfo};
use crate::source::Source;
use crate::workspace::pointer::PointerRecord;
use crate::{Error, Result};

/// Options for network transfers during acquisition
///
/// Transfers are aborted as soon as the deadline passes or the
/// cancellation flag is raised; a partially materialized clone is removed
/// rather than left behind as a corrupt cache entry. Retrying after a
/// failure is the caller's decision.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Abort the transfer once this much wall-clock time has elapsed
    pub timeout: Option<Duration>,
    /// Cooperative cancellation flag checked during the transfer
    pub cancel: Option<Arc<AtomicBool>>,
}

impl TransferOptions {
    /// Options with a timeout and no cancellation flag
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }
}

/// Persistent cache of repositories
pub struct WorkspaceStore {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl WorkspaceStore {
    /// Open a store rooted at the default cache directory
    ///
    /// Returns `~/.cache/quarry/repos` (platform equivalent) as the root.
    pub fn open_default() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Internal("could not determine cache directory".to_string()))?;
        Self::open(cache_dir.join("quarry").join("repos"))
    }

    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            Error::Internal(format!(
                "failed to create workspace root {}: {}",
                root.display(),
                e
            ))
        })?;
        let root = fs::canonicalize(&root).map_err(|e| {
            Error::Internal(format!(
                "failed to resolve workspace root {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// The workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire a repository with default transfer options
    pub fn acquire(&self, source: &str) -> Result<RepositoryHandle> {
        self.acquire_with(source, &TransferOptions::default())
    }

    /// Acquire a repository: open a local path in place, or clone-or-update
    /// a remote into the cache
    ///
    /// Either returns a fully populated handle or fails; no partially
    /// initialized handle is ever exposed. Repeated acquisition of the
    /// same remote source updates the existing clone instead of cloning
    /// again.
    pub fn acquire_with(&self, source: &str, transfer: &TransferOptions) -> Result<RepositoryHandle> {
        let source = Source::parse(source)?;
        if source.is_local() {
            self.acquire_local(&source)
        } else {
            self.acquire_remote(&source, transfer)
        }
    }

    fn acquire_local(&self, source: &Source) -> Result<RepositoryHandle> {
        let raw_path = Path::new(source.as_str());
        if !raw_path.exists() {
            return Err(Error::NotFound(format!(
                "local path does not exist: {}",
                source.as_str()
            )));
        }
        let path = fs::canonicalize(raw_path).map_err(|e| {
            Error::Internal(format!("failed to resolve {}: {}", raw_path.display(), e))
        })?;

        let mutate = self.lock_for(&path);
        let info = {
            let _guard = mutate.lock().unwrap_or_else(PoisonError::into_inner);

            self.register_pointer(source, &path)?;

            let repo = open_non_bare(&path)?;
            let head = head_state(&repo)?;
            tracing::info!(name = source.name(), path = %path.display(), "opened local repository");
            RepositoryInfo {
                name: source.name().to_string(),
                path,
                is_local: true,
                default_branch: head.default_branch,
                last_commit: head.last_commit,
                commit_count: head.commit_count,
                branch_count: head.branch_count,
            }
        };
        Ok(RepositoryHandle::new(info, mutate))
    }

    fn acquire_remote(
        &self,
        source: &Source,
        transfer: &TransferOptions,
    ) -> Result<RepositoryHandle> {
        let target = self.root.join(source.name());
        let mutate = self.lock_for(&target);
        let info = {
            let _guard = mutate.lock().unwrap_or_else(PoisonError::into_inner);

            if target.exists() {
                let repo = Repository::open(&target).map_err(|_| {
                    Error::Conflict(format!(
                        "cache entry {} is not a valid repository; remove it to allow a fresh clone",
                        target.display()
                    ))
                })?;
                verify_origin(&repo, source)?;
                tracing::info!(name = source.name(), "updating cached clone in place");
                update_in_place(&repo, transfer)?;
            } else {
                tracing::info!(name = source.name(), url = source.as_str(), "cloning repository");
                clone_fresh(source.as_str(), &target, transfer)?;
            }

            let repo = open_non_bare(&target)?;
            let head = head_state(&repo)?;
            RepositoryInfo {
                name: source.name().to_string(),
                path: target,
                is_local: false,
                default_branch: head.default_branch,
                last_commit: head.last_commit,
                commit_count: head.commit_count,
                branch_count: head.branch_count,
            }
        };
        Ok(RepositoryHandle::new(info, mutate))
    }

    /// Register a pointer record for a local repository, idempotently
    ///
    /// An existing record for the same path is left alone; a record or
    /// cache entry already using the name for something else is a
    /// collision.
    fn register_pointer(&self, source: &Source, path: &Path) -> Result<()> {
        let record_path = self.root.join(source.name());
        if record_path.is_dir() {
            return Err(Error::Conflict(format!(
                "name '{}' is already used by a cached clone",
                source.name()
            )));
        }
        if record_path.exists() {
            let existing = PointerRecord::load(&record_path)?;
            if existing.path == path {
                return Ok(());
            }
            return Err(Error::Conflict(format!(
                "name '{}' already points at {}",
                source.name(),
                existing.path.display()
            )));
        }
        PointerRecord::new(source.as_str(), path).save(&record_path)?;
        tracing::info!(name = source.name(), path = %path.display(), "registered local repository");
        Ok(())
    }

    /// One mutual-exclusion region per canonical workspace path
    pub(crate) fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

/// Reject an existing cache entry whose origin is a different source
fn verify_origin(repo: &Repository, source: &Source) -> Result<()> {
    let remote = repo.find_remote("origin").map_err(|_| {
        Error::Conflict(format!(
            "cache entry for '{}' has no origin remote",
            source.name()
        ))
    })?;
    match remote.url() {
        Some(url) if url == source.as_str() => Ok(()),
        Some(url) => Err(Error::Conflict(format!(
            "name '{}' is already cached from {}",
            source.name(),
            url
        ))),
        None => Err(Error::Conflict(format!(
            "cache entry for '{}' has no origin URL",
            source.name()
        ))),
    }
}

fn remote_callbacks(transfer: &TransferOptions) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    let deadline = transfer.timeout.map(|timeout| Instant::now() + timeout);
    let cancel = transfer.cancel.clone();
    callbacks.transfer_progress(move |_| {
        if cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return false;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return false;
        }
        true
    });
    callbacks
}

fn fetch_options(transfer: &TransferOptions) -> FetchOptions<'static> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(transfer));
    options
}

fn transport_error(operation: &str, url: &str, err: &git2::Error) -> Error {
    if err.code() == ErrorCode::User {
        Error::Transport(format!("{} of {} cancelled or timed out", operation, url))
    } else {
        Error::Transport(format!("{} of {} failed: {}", operation, url, err))
    }
}

/// Clone a remote into the cache, removing the directory on failure
fn clone_fresh(url: &str, target: &Path, transfer: &TransferOptions) -> Result<()> {
    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options(transfer));
    match builder.clone(url, target) {
        Ok(_) => Ok(()),
        Err(e) => {
            // A partial clone must not survive as a cache entry
            if target.exists() {
                if let Err(remove_err) = fs::remove_dir_all(target) {
                    tracing::warn!(
                        path = %target.display(),
                        error = %remove_err,
                        "failed to remove partial clone"
                    );
                }
            }
            Err(transport_error("clone", url, &e))
        }
    }
}

/// Fetch from origin and fast-forward the default branch
///
/// On any failure the previous head, index, and working tree are left as
/// they were; a diverged cache branch is a conflict, not a forced reset.
fn update_in_place(repo: &Repository, transfer: &TransferOptions) -> Result<()> {
    let head = repo
        .head()
        .map_err(|e| Error::Internal(format!("failed to read HEAD: {}", e)))?;
    if !head.is_branch() {
        return Err(Error::Conflict(
            "cache entry has a detached HEAD".to_string(),
        ));
    }
    let branch = head
        .shorthand()
        .ok_or_else(|| Error::Internal("HEAD name is not valid UTF-8".to_string()))?
        .to_string();

    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| Error::Conflict(format!("cache entry has no origin remote: {}", e)))?;
    let url = remote.url().unwrap_or("origin").to_string();
    remote
        .fetch(
            &[branch.as_str()],
            Some(&mut fetch_options(transfer)),
            None,
        )
        .map_err(|e| transport_error("fetch", &url, &e))?;

    let fetch_head = repo
        .find_reference("FETCH_HEAD")
        .map_err(|e| Error::Internal(format!("failed to read FETCH_HEAD: {}", e)))?;
    let fetched = repo
        .reference_to_annotated_commit(&fetch_head)
        .map_err(|e| Error::Internal(format!("failed to resolve FETCH_HEAD: {}", e)))?;

    let (analysis, _) = repo
        .merge_analysis(&[&fetched])
        .map_err(|e| Error::Internal(format!("failed to analyze fetched head: {}", e)))?;
    if analysis.is_up_to_date() {
        tracing::debug!(branch = %branch, "cache entry already up to date");
        return Ok(());
    }
    if !analysis.is_fast_forward() {
        return Err(Error::Conflict(format!(
            "cached branch '{}' has diverged from its remote",
            branch
        )));
    }

    // Update the working tree first so a failed checkout leaves the old
    // head in place
    let target = repo
        .find_commit(fetched.id())
        .map_err(|e| Error::Internal(format!("failed to resolve fetched commit: {}", e)))?;
    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(target.as_object(), Some(&mut checkout))
        .map_err(|e| {
            if e.code() == ErrorCode::Conflict {
                Error::Conflict(format!(
                    "cache entry for '{}' has local modifications; not updating",
                    branch
                ))
            } else {
                Error::Internal(format!("checkout of fetched head failed: {}", e))
            }
        })?;

    let refname = format!("refs/heads/{}", branch);
    let mut reference = repo
        .find_reference(&refname)
        .map_err(|e| Error::Internal(format!("failed to read {}: {}", refname, e)))?;
    reference
        .set_target(fetched.id(), "quarry: fast-forward")
        .map_err(|e| Error::Internal(format!("failed to advance {}: {}", refname, e)))?;
    repo.set_head(&refname)
        .map_err(|e| Error::Internal(format!("failed to move HEAD: {}", e)))?;

    tracing::info!(branch = %branch, commit = %fetched.id(), "fast-forwarded cache entry");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_local_opens_in_place() {
        let dir = TempDir::new().unwrap();
        let repo_dir = dir.path().join("myrepo");
        let repo = testutil::init_repo(&repo_dir);
        testutil::commit_file(&repo, "file.txt", "content", "initial");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();
        let handle = store.acquire(repo_dir.to_str().unwrap()).unwrap();

        let info = handle.info();
        assert_eq!(info.name, "myrepo");
        assert!(info.is_local);
        assert!(info.path.is_absolute());
        assert_eq!(info.commit_count, 1);
        assert_eq!(info.branch_count, 1);
        assert_eq!(info.last_commit.len(), 40);

        // Registered as a pointer record, not a copy
        let record_path = store.root().join("myrepo");
        assert!(record_path.is_file());
        let record = PointerRecord::load(&record_path).unwrap();
        assert_eq!(record.path, fs::canonicalize(&repo_dir).unwrap());
    }

    #[test]
    fn test_acquire_local_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo_dir = dir.path().join("myrepo");
        let repo = testutil::init_repo(&repo_dir);
        testutil::commit_file(&repo, "file.txt", "content", "initial");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();
        let first = store.acquire(repo_dir.to_str().unwrap()).unwrap();
        let second = store.acquire(repo_dir.to_str().unwrap()).unwrap();
        assert_eq!(first.info().path, second.info().path);
    }

    #[test]
    fn test_acquire_local_missing_path() {
        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let err = store.acquire("/does/not/exist/anywhere").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_acquire_local_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        fs::create_dir(&plain).unwrap();

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let err = store.acquire(plain.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_acquire_local_bare_repository() {
        let dir = TempDir::new().unwrap();
        let bare = dir.path().join("bare");
        git2::Repository::init_bare(&bare).unwrap();

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let err = store.acquire(bare.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_acquire_local_name_collision() {
        let dir = TempDir::new().unwrap();
        for sub in ["a", "b"] {
            let repo = testutil::init_repo(&dir.path().join(sub).join("myrepo"));
            testutil::commit_file(&repo, "file.txt", sub, "initial");
        }

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();
        store
            .acquire(dir.path().join("a").join("myrepo").to_str().unwrap())
            .unwrap();

        let err = store
            .acquire(dir.path().join("b").join("myrepo").to_str().unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_acquire_remote_clones_then_updates() {
        let upstream_dir = TempDir::new().unwrap();
        let (url, upstream) = testutil::init_upstream(upstream_dir.path(), "repo");
        testutil::commit_file(&upstream, "file.txt", "v1", "first");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let first = store.acquire(&url).unwrap();
        let info = first.info();
        assert_eq!(info.name, "repo");
        assert!(!info.is_local);
        assert_eq!(info.path, store.root().join("repo"));
        assert_eq!(info.commit_count, 1);

        // Leave a marker so a re-clone would be detectable
        let marker = info.path.join(".marker");
        fs::write(&marker, "still here").unwrap();

        testutil::commit_file(&upstream, "file.txt", "v2", "second");
        let second = store.acquire(&url).unwrap();
        let updated = second.info();
        assert_eq!(updated.path, info.path);
        assert_ne!(updated.last_commit, info.last_commit);
        assert!(updated.commit_count >= info.commit_count);
        assert_eq!(updated.commit_count, 2);
        assert!(marker.exists(), "update must happen in place, not re-clone");

        let content = fs::read(updated.path.join("file.txt")).unwrap();
        assert_eq!(content, b"v2");
    }

    #[test]
    fn test_acquire_remote_up_to_date_is_noop() {
        let upstream_dir = TempDir::new().unwrap();
        let (url, upstream) = testutil::init_upstream(upstream_dir.path(), "repo");
        testutil::commit_file(&upstream, "file.txt", "v1", "first");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let first = store.acquire(&url).unwrap();
        let second = store.acquire(&url).unwrap();
        assert_eq!(first.info().last_commit, second.info().last_commit);
        assert_eq!(first.info().commit_count, second.info().commit_count);
    }

    #[test]
    fn test_acquire_remote_name_collision() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let (url_a, upstream_a) = testutil::init_upstream(dir_a.path(), "repo");
        let (url_b, upstream_b) = testutil::init_upstream(dir_b.path(), "repo");
        testutil::commit_file(&upstream_a, "a.txt", "a", "a");
        testutil::commit_file(&upstream_b, "b.txt", "b", "b");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();
        store.acquire(&url_a).unwrap();

        let err = store.acquire(&url_b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // The first entry is untouched
        assert!(store.root().join("repo").join("a.txt").exists());
    }

    #[test]
    fn test_acquire_remote_corrupt_cache_entry() {
        let upstream_dir = TempDir::new().unwrap();
        let (url, upstream) = testutil::init_upstream(upstream_dir.path(), "repo");
        testutil::commit_file(&upstream, "file.txt", "v1", "first");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        // Simulate an interrupted clone: a directory that is not a repository
        let stale = store.root().join("repo");
        fs::create_dir(&stale).unwrap();
        fs::write(stale.join("junk"), "partial").unwrap();

        let err = store.acquire(&url).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        // No destructive recovery
        assert!(stale.join("junk").exists());
    }

    #[test]
    fn test_acquire_remote_unreachable_is_transport() {
        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let err = store
            .acquire("file:///nonexistent/upstream/repo.git")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        // No partial cache entry is left behind
        assert!(!store.root().join("repo").exists());
    }

    #[test]
    fn test_acquire_remote_cancelled_before_start() {
        let upstream_dir = TempDir::new().unwrap();
        let (url, upstream) = testutil::init_upstream(upstream_dir.path(), "repo");
        testutil::commit_file(&upstream, "file.txt", "v1", "first");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let cancel = Arc::new(AtomicBool::new(true));
        let transfer = TransferOptions {
            timeout: None,
            cancel: Some(cancel),
        };
        let err = store.acquire_with(&url, &transfer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!store.root().join("repo").exists());
    }

    #[test]
    fn test_derived_cache_path_for_remote_url() {
        // "https://example.com/org/repo.git" derives "repo"; the cache
        // path is workspace_root/repo
        let source = Source::parse("https://example.com/org/repo.git").unwrap();
        assert_eq!(source.name(), "repo");

        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();
        assert_eq!(
            store.root().join(source.name()),
            store.root().join("repo")
        );
    }

    #[test]
    fn test_distinct_identities_use_distinct_locks() {
        let root = TempDir::new().unwrap();
        let store = WorkspaceStore::open(root.path()).unwrap();

        let a = store.lock_for(Path::new("/w/a"));
        let b = store.lock_for(Path::new("/w/b"));
        let a_again = store.lock_for(Path::new("/w/a"));

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));

        // Holding one identity's region does not block another's
        let _guard = a.lock().unwrap();
        let other = b.try_lock();
        assert!(other.is_ok());
    }
}
