//! Write-side backing store operations.

use std::io::Write;
use std::path::Path;

use crate::FsError;

/// Write operations of a path-addressed backing store.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn StoreWrite`.
pub trait StoreWrite: Send + Sync {
    /// Atomically create an empty plain file.
    ///
    /// Returns `Ok(false)` if something already exists at `path`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the parent directory does not exist
    fn create_new_file(&self, path: &Path) -> Result<bool, FsError>;

    /// Open a plain file for sequential writing from the start.
    ///
    /// Creates the file if missing and truncates it otherwise. Data is
    /// committed when the returned writer is flushed and dropped.
    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, FsError>;

    /// Delete a file or an empty directory. Never recursive.
    ///
    /// Returns `Ok(false)` when nothing was deleted: the path is missing or
    /// names a non-empty directory.
    fn delete(&self, path: &Path) -> Result<bool, FsError>;
}
