//! Read-only queries against an acquired repository
//!
//! Queries take an optional reference; `None` means the current head.
//! Historical commit data is immutable and content-addressed, so reads
//! pinned to an explicit reference run without the per-repository
//! mutation lock. Head-relative reads resolve the head under the lock so
//! they cannot race a concurrent fetch or checkout.

use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use git2::{Commit, ErrorCode, ObjectType, Oid, Repository, Tree};
use serde::Serialize;

use super::handle::RepositoryHandle;
use crate::{Error, Result};

/// A content entry in a repository tree at a given reference
///
/// Identity is `(path, blob_id)`: two entries with equal path and blob id
/// at different references carry the same content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Forward-slash path relative to the repository root
    pub path: String,
    /// Blob size in bytes
    pub size: u64,
    /// File mode bits as recorded in the tree
    pub mode: i32,
    /// Content-addressed identifier of the blob
    pub blob_id: String,
}

/// One commit in a file's history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Full hex commit identifier
    pub commit: String,
    /// Author display name
    pub author: String,
    /// RFC 3339 authoring timestamp
    pub timestamp: String,
    /// Trimmed commit message
    pub message: String,
}

impl RepositoryHandle {
    /// List every file committed at `at` (head when `None`)
    ///
    /// Directories and VCS metadata are not emitted; the result is sorted
    /// lexicographically by path, so two calls at the same reference
    /// return identical sequences.
    pub fn file_tree(&self, at: Option<&str>) -> Result<Vec<FileEntry>> {
        let repo = self.open_repo()?;
        let commit = self.resolve_commit(&repo, at)?;
        let tree = commit
            .tree()
            .map_err(|e| Error::Internal(format!("failed to read commit tree: {}", e)))?;

        let mut entries = Vec::new();
        collect_tree(&repo, &tree, "", &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// The content of `path` exactly as committed at `at` (head when `None`)
    ///
    /// Fails with `NotFound` if the path does not exist at that precise
    /// reference; there is no fallback to any other state.
    pub fn file_content(&self, path: &str, at: Option<&str>) -> Result<Vec<u8>> {
        let repo = self.open_repo()?;
        let commit = self.resolve_commit(&repo, at)?;
        let tree = commit
            .tree()
            .map_err(|e| Error::Internal(format!("failed to read commit tree: {}", e)))?;

        let entry = tree.get_path(Path::new(path)).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::NotFound(format!("'{}' does not exist at {}", path, commit.id()))
            } else {
                Error::Internal(format!("failed to look up '{}': {}", path, e))
            }
        })?;
        let blob = repo
            .find_blob(entry.id())
            .map_err(|_| Error::NotFound(format!("'{}' is not a file at {}", path, commit.id())))?;
        Ok(blob.content().to_vec())
    }

    /// Commits that touched `path`, newest first
    ///
    /// A path that was never committed yields an empty sequence, not an
    /// error. Merge commits that take one side unchanged are skipped, as
    /// is conventional for path-restricted history.
    pub fn file_history(&self, path: &str) -> Result<Vec<HistoryEntry>> {
        let repo = self.open_repo()?;
        let head = {
            let _guard = self.lock_mutation();
            repo.head()
                .and_then(|h| h.peel_to_commit())
                .map_err(|e| Error::Internal(format!("failed to resolve HEAD: {}", e)))?
                .id()
        };

        let mut revwalk = repo
            .revwalk()
            .map_err(|e| Error::Internal(format!("failed to start history walk: {}", e)))?;
        revwalk
            .push(head)
            .map_err(|e| Error::Internal(format!("failed to start history walk: {}", e)))?;
        revwalk
            .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
            .map_err(|e| Error::Internal(format!("failed to start history walk: {}", e)))?;

        let target = Path::new(path);
        let mut entries = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| Error::Internal(format!("history walk failed: {}", e)))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| Error::Internal(format!("history walk failed: {}", e)))?;

            if commit_touches_path(&commit, target)? {
                entries.push(history_entry(&commit));
            }
        }
        Ok(entries)
    }

    /// Resolve `at` to a commit; `None` resolves the current head
    fn resolve_commit<'r>(&self, repo: &'r Repository, at: Option<&str>) -> Result<Commit<'r>> {
        match at {
            Some(spec) => {
                let object = repo
                    .revparse_single(spec)
                    .map_err(|_| Error::NotFound(format!("reference '{}' not found", spec)))?;
                object.peel_to_commit().map_err(|_| {
                    Error::NotFound(format!("reference '{}' does not resolve to a commit", spec))
                })
            }
            None => {
                // Head-relative resolution serializes with writers
                let _guard = self.lock_mutation();
                repo.head()
                    .and_then(|h| h.peel_to_commit())
                    .map_err(|e| Error::Internal(format!("failed to resolve HEAD: {}", e)))
            }
        }
    }
}

fn collect_tree(
    repo: &Repository,
    tree: &Tree<'_>,
    prefix: &str,
    out: &mut Vec<FileEntry>,
) -> Result<()> {
    for entry in tree.iter() {
        let name = entry
            .name()
            .ok_or_else(|| Error::Internal("tree entry name is not valid UTF-8".to_string()))?;
        match entry.kind() {
            Some(ObjectType::Tree) => {
                let subtree = repo
                    .find_tree(entry.id())
                    .map_err(|e| Error::Internal(format!("failed to read subtree: {}", e)))?;
                let prefix = format!("{}{}/", prefix, name);
                collect_tree(repo, &subtree, &prefix, out)?;
            }
            Some(ObjectType::Blob) => {
                let blob = repo
                    .find_blob(entry.id())
                    .map_err(|e| Error::Internal(format!("failed to read blob: {}", e)))?;
                out.push(FileEntry {
                    path: format!("{}{}", prefix, name),
                    size: blob.size() as u64,
                    mode: entry.filemode(),
                    blob_id: entry.id().to_string(),
                });
            }
            // Submodule commits are not content entries
            _ => {}
        }
    }
    Ok(())
}

/// Whether `commit` changed the entry at `path` relative to its parents
fn commit_touches_path(commit: &Commit<'_>, path: &Path) -> Result<bool> {
    let current = entry_id(commit, path)?;

    if commit.parent_count() == 0 {
        return Ok(current.is_some());
    }
    for parent in commit.parents() {
        if entry_id(&parent, path)? == current {
            return Ok(false);
        }
    }
    Ok(true)
}

fn entry_id(commit: &Commit<'_>, path: &Path) -> Result<Option<Oid>> {
    let tree = commit
        .tree()
        .map_err(|e| Error::Internal(format!("failed to read commit tree: {}", e)))?;
    match tree.get_path(path) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(Error::Internal(format!(
            "failed to look up '{}': {}",
            path.display(),
            e
        ))),
    }
}

fn history_entry(commit: &Commit<'_>) -> HistoryEntry {
    let author = commit.author();
    HistoryEntry {
        commit: commit.id().to_string(),
        author: String::from_utf8_lossy(author.name_bytes()).into_owned(),
        timestamp: format_time(author.when()),
        message: String::from_utf8_lossy(commit.message_bytes())
            .trim()
            .to_string(),
    }
}

/// Format a git timestamp as RFC 3339, preserving the author's offset
fn format_time(time: git2::Time) -> String {
    let Some(utc) = DateTime::<Utc>::from_timestamp(time.seconds(), 0) else {
        return time.seconds().to_string();
    };
    match FixedOffset::east_opt(time.offset_minutes() * 60) {
        Some(offset) => utc.with_timezone(&offset).to_rfc3339(),
        None => utc.to_rfc3339(),
    }
}
