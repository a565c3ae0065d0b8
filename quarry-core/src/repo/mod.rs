//! Repository handles and read/write operations against acquired repositories

mod branch;
mod handle;
mod snapshot;

pub use handle::{RepositoryHandle, RepositoryInfo};
pub use snapshot::{FileEntry, HistoryEntry};

pub(crate) use handle::{head_state, open_non_bare};
