//! The persistent workspace: clone-or-update acquisition, pointer
//! records for caller-owned repositories, and cache lifecycle.

mod lifecycle;
mod pointer;
mod store;

pub use pointer::PointerRecord;
pub use store::{TransferOptions, WorkspaceStore};
