//! Source string classification and name derivation
//!
//! A source string is either a remote URL or a local filesystem path.
//! Classification is purely syntactic: exactly three remote shapes are
//! recognized (SSH-style, HTTP(S) ending in `.git`, `file://` ending in
//! `.git`); everything else is treated as a local path. No I/O happens
//! here, so the same input always classifies the same way.

use std::path::Path;

use crate::{Error, Result};

/// Whether a source names a caller-owned path or a remote repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A filesystem path owned by the caller
    Local,
    /// A URL reachable over a git transport
    Remote,
}

/// A classified repository source
///
/// Carries the raw source string, its classification, and the short name
/// derived from it. The name addresses the repository inside a
/// [`WorkspaceStore`](crate::WorkspaceStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    raw: String,
    kind: SourceKind,
    name: String,
}

impl Source {
    /// Parse a source string
    ///
    /// Classifies the source and derives its short name. Fails with
    /// `SourceInvalid` when no usable name can be derived (for example a
    /// bare `/` or a URL with an empty final segment).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::SourceInvalid("source string is empty".to_string()));
        }

        let kind = classify(input);
        let name = derive_name(input, kind)?;

        Ok(Self {
            raw: input.to_string(),
            kind,
            name,
        })
    }

    /// The raw source string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The classification of this source
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// True when the source was not recognized as a remote URL
    pub fn is_local(&self) -> bool {
        self.kind == SourceKind::Local
    }

    /// The derived short name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Classify a source string as local or remote
fn classify(source: &str) -> SourceKind {
    if is_ssh_url(source) || is_http_url(source) || is_file_url(source) {
        SourceKind::Remote
    } else {
        SourceKind::Local
    }
}

/// SSH-style remote: `user@host:path.git`
fn is_ssh_url(source: &str) -> bool {
    let Some((user_host, path)) = source.split_once(':') else {
        return false;
    };
    let Some((user, host)) = user_host.split_once('@') else {
        return false;
    };

    !user.is_empty()
        && !user.contains('/')
        && !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && is_repo_path(path)
}

/// HTTP(S) remote: a parseable URL whose path ends in `.git`
fn is_http_url(source: &str) -> bool {
    if !source.starts_with("https://") && !source.starts_with("http://") {
        return false;
    }
    if !source.ends_with(".git") {
        return false;
    }
    url::Url::parse(source).is_ok_and(|u| u.host_str().is_some_and(|h| !h.is_empty()))
}

/// Local-file remote: `file://...` ending in `.git`
fn is_file_url(source: &str) -> bool {
    source
        .strip_prefix("file://")
        .is_some_and(|path| is_repo_path(path))
}

fn is_repo_path(path: &str) -> bool {
    let Some(stem) = path.strip_suffix(".git") else {
        return false;
    };
    !stem.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'))
}

/// Derive the short name for a source
///
/// Remote: the final path segment with any trailing `.git` stripped.
/// Local: the final component of the path, without resolving it.
fn derive_name(source: &str, kind: SourceKind) -> Result<String> {
    let name = match kind {
        SourceKind::Remote => {
            let trimmed = source.trim_end_matches('/');
            let tail = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
            tail.strip_suffix(".git").unwrap_or(tail).to_string()
        }
        SourceKind::Local => Path::new(source)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string(),
    };

    if name.is_empty() {
        return Err(Error::SourceInvalid(format!(
            "cannot derive a repository name from '{}'",
            source
        )));
    }

    Ok(name)
}
