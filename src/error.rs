//! Error types for the handle adapter.

use std::path::PathBuf;

use crate::FileHandle;

/// Adapter error type with contextual variants.
///
/// Every variant collapses onto one of the five protocol-visible kinds
/// returned by [`FsError::kind`]. Uses `#[non_exhaustive]` for forward
/// compatibility.
///
/// # Examples
///
/// ```rust
/// use handlefs::{ErrorKind, FsError};
/// use std::path::PathBuf;
///
/// let err = FsError::NotFound { path: PathBuf::from("/missing") };
/// assert_eq!(err.to_string(), "not found: /missing");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    // Handle Errors
    /// Handle is well-formed but was never minted by this process.
    #[error("stale handle: {handle}")]
    StaleHandle {
        /// The unknown handle.
        handle: FileHandle,
    },

    /// Wire bytes do not encode a handle.
    #[error("malformed handle: expected 16 bytes, got {len}")]
    MalformedHandle {
        /// Length of the rejected buffer.
        len: usize,
    },

    // Path Errors
    /// Path does not exist at the backing store.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Path already exists when it shouldn't.
    #[error("{operation}: already exists: {path}")]
    AlreadyExists {
        /// The path that already exists.
        path: PathBuf,
        /// The operation that failed.
        operation: &'static str,
    },

    /// Child name cannot be joined onto a directory path.
    #[error("invalid name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    // Operation Errors
    /// Operation is deliberately not implemented.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// Generic backing store failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The five error kinds visible to the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Stale or forged handle.
    StaleHandle,
    /// Object absent at the backing store.
    NotFound,
    /// Creation collided with an existing object.
    AlreadyExists,
    /// Operation deliberately unimplemented.
    NotSupported,
    /// Any other backing store failure.
    Io,
}

impl ErrorKind {
    /// NFSv3 status code (RFC 1813) for this kind.
    pub const fn nfs3_status(self) -> u32 {
        match self {
            ErrorKind::StaleHandle => 70,
            ErrorKind::NotFound => 2,
            ErrorKind::AlreadyExists => 17,
            ErrorKind::NotSupported => 10004,
            ErrorKind::Io => 5,
        }
    }
}

impl FsError {
    /// Protocol-visible kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::StaleHandle { .. } | FsError::MalformedHandle { .. } => {
                ErrorKind::StaleHandle
            }
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsError::NotSupported { .. } => ErrorKind::NotSupported,
            FsError::InvalidName { .. } | FsError::Backend(_) | FsError::Io { .. } => {
                ErrorKind::Io
            }
        }
    }

    /// Wrap an I/O error, keeping not-found and already-exists distinguishable.
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound { path },
            std::io::ErrorKind::AlreadyExists => FsError::AlreadyExists { path, operation },
            _ => FsError::Io {
                operation,
                path,
                source,
            },
        }
    }

    /// Rebuild an equivalent error from a shared reference.
    ///
    /// Concurrent waiters on one stream open all observe the same failure;
    /// `std::io::Error` is not `Clone`, so the source is re-created from its
    /// kind and message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            FsError::StaleHandle { handle } => FsError::StaleHandle { handle: *handle },
            FsError::MalformedHandle { len } => FsError::MalformedHandle { len: *len },
            FsError::NotFound { path } => FsError::NotFound { path: path.clone() },
            FsError::AlreadyExists { path, operation } => FsError::AlreadyExists {
                path: path.clone(),
                operation: *operation,
            },
            FsError::InvalidName { name } => FsError::InvalidName { name: name.clone() },
            FsError::NotSupported { operation } => FsError::NotSupported {
                operation: *operation,
            },
            FsError::Backend(msg) => FsError::Backend(msg.clone()),
            FsError::Io {
                operation,
                path,
                source,
            } => FsError::Io {
                operation: *operation,
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(error: std::io::Error) -> Self {
        FsError::io("io", PathBuf::new(), error)
    }
}
