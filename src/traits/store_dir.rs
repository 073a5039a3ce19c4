//! Directory operations of a backing store.

use std::path::Path;

use crate::{FileStatus, FsError};

/// Directory operations of a path-addressed backing store.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn StoreDir`.
pub trait StoreDir: Send + Sync {
    /// Create a directory and any missing ancestors.
    ///
    /// Idempotent: returns `Ok(true)` if the directory already exists.
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyExists`] if a component exists but is not a directory
    fn mkdirs(&self, path: &Path) -> Result<bool, FsError>;

    /// Status of every immediate child of a directory.
    ///
    /// Order is whatever the store produces.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the directory does not exist
    fn list_status(&self, path: &Path) -> Result<Vec<FileStatus>, FsError>;
}
