//! Read-side backing store operations.

use std::path::Path;

use crate::{FileStatus, FileType, FsError};

/// An open, readable stream supporting positional reads.
///
/// Reads take an explicit offset and never move a shared cursor, so one
/// stream can serve concurrent readers at different offsets.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; `read_at` takes `&self`.
pub trait ReadStream: Send + Sync {
    /// Read into `buf` starting at byte `offset` of the object.
    ///
    /// Returns the number of bytes read; `0` at or past end of object.
    ///
    /// # Errors
    ///
    /// - [`FsError::Io`] on a transport or store failure
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError>;

    /// Release the underlying resource.
    ///
    /// Reads after `close` fail. Closing twice is not an error.
    fn close(&self) -> Result<(), FsError>;
}

/// Read operations of a path-addressed backing store.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn StoreRead`.
pub trait StoreRead: Send + Sync {
    /// Check if a path exists.
    ///
    /// Returns `Ok(false)` when it does not; errors only on store failures.
    fn exists(&self, path: &Path) -> Result<bool, FsError>;

    /// Get the status (type, length, timestamps) of a path.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    fn status(&self, path: &Path) -> Result<FileStatus, FsError>;

    /// Open a plain file for positional reads.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    fn open(&self, path: &Path) -> Result<Box<dyn ReadStream>, FsError>;

    /// Check if the path is a plain file.
    ///
    /// Returns `Ok(false)` for directories and for missing paths.
    fn is_file(&self, path: &Path) -> Result<bool, FsError> {
        match self.status(path) {
            Ok(status) => Ok(status.file_type == FileType::Regular),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
