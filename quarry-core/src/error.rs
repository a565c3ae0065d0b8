//! Error types for Quarry

use thiserror::Error;

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable failure cause
///
/// Callers branch on the kind instead of inspecting message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed source string
    SourceInvalid,
    /// Missing path, unresolvable reference, absent file, or unknown branch
    NotFound,
    /// Name collision, bare repository, corrupt cache entry, or unsafe checkout
    Conflict,
    /// Clone or fetch network failure
    Transport,
    /// Unexpected condition
    Internal,
}

/// Error type for Quarry operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed source string (URL or path)
    #[error("invalid source: {0}")]
    SourceInvalid(String),

    /// Missing local path, unresolvable reference, absent file at a
    /// reference, or unknown branch
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision, bare repository, corrupt or partial cache entry,
    /// or a checkout that would discard local modifications
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network failure during clone or fetch
    #[error("transport error: {0}")]
    Transport(String),

    /// Unexpected condition
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The kind of failure this error represents
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SourceInvalid(_) => ErrorKind::SourceInvalid,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(format!("IO error: {}", err))
    }
}
