//! Quarry Core - repository ingestion and workspace caching
//!
//! This crate turns a source string — a local filesystem path or a remote
//! git URL — into a locally addressable, queryable snapshot backed by a
//! persistent on-disk cache. Remote repositories are cloned once and
//! updated in place on later acquisitions; local repositories are opened
//! where they live and never copied.

pub mod config;
pub mod error;
pub mod repo;
pub mod source;
pub mod workspace;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use repo::{FileEntry, HistoryEntry, RepositoryHandle, RepositoryInfo};
pub use source::{Source, SourceKind};
pub use workspace::{PointerRecord, TransferOptions, WorkspaceStore};

#[cfg(test)]
pub(crate) mod testutil;
