//! Test fixtures built with git2

use std::path::Path;
use std::sync::{Arc, Mutex};

use git2::{Repository, Signature};

use crate::repo::{RepositoryHandle, RepositoryInfo};

/// Initialize a working repository with test identity configured
pub fn init_repo(path: &Path) -> Repository {
    let repo = Repository::init(path).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }
    repo
}

/// Initialize an "upstream" repository reachable through a file:// URL
///
/// The directory is named `<name>.git` so the URL matches the recognized
/// remote shape while the repository itself stays a working clone that
/// tests can commit to directly.
pub fn init_upstream(base: &Path, name: &str) -> (String, Repository) {
    let dir = base.join(format!("{}.git", name));
    let repo = init_repo(&dir);
    let url = format!("file://{}", dir.display());
    (url, repo)
}

/// Write `content` to `rel_path`, stage it, and commit on the current HEAD
pub fn commit_file(repo: &Repository, rel_path: &str, content: &str, message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    let file_path = workdir.join(rel_path);
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&file_path, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(rel_path)).unwrap();
    index.write().unwrap();
    commit_index(repo, message)
}

/// Delete `rel_path`, stage the removal, and commit on the current HEAD
pub fn remove_file(repo: &Repository, rel_path: &str, message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::remove_file(workdir.join(rel_path)).unwrap();

    let mut index = repo.index().unwrap();
    index.remove_path(Path::new(rel_path)).unwrap();
    index.write().unwrap();
    commit_index(repo, message)
}

fn commit_index(repo: &Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let signature = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap()
}

/// Build a handle over an already-open test repository
pub fn handle_for_repo(repo: &Repository) -> RepositoryHandle {
    let path = repo.workdir().unwrap().to_path_buf();
    let state = crate::repo::head_state(repo).unwrap();
    RepositoryHandle::new(
        RepositoryInfo {
            name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("test")
                .to_string(),
            path,
            is_local: true,
            default_branch: state.default_branch,
            last_commit: state.last_commit,
            commit_count: state.commit_count,
            branch_count: state.branch_count,
        },
        Arc::new(Mutex::new(())),
    )
}
