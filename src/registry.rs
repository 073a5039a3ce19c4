//! # Handle Registry
//!
//! Bidirectional mapping between backing store paths and [`FileHandle`]s.
//!
//! ## Responsibility
//! - Mint a random handle the first time a path is exposed
//! - Resolve handles back to paths on every protocol call
//!
//! ## Invariants
//! - A path has at most one handle and a handle names at most one path.
//! - Entries are never removed; a handle stays resolvable for the life of the
//!   registry even after its path is deleted from the store.
//!
//! Both directions live behind one lock, so two callers racing to mint a
//! handle for the same new path observe the same handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::trace;

use crate::{FileHandle, FsError, Node};

#[derive(Default)]
struct Table {
    by_path: HashMap<PathBuf, FileHandle>,
    by_handle: HashMap<FileHandle, PathBuf>,
}

/// Process-wide path <-> handle table.
///
/// Constructed once and shared (usually behind an `Arc`) by every adapter
/// serving the same export.
///
/// # Example
///
/// ```rust
/// use handlefs::HandleRegistry;
/// use std::path::Path;
///
/// let registry = HandleRegistry::new();
/// let h = registry.handle_for(Path::new("/data/a.txt"));
/// assert_eq!(registry.handle_for(Path::new("/data/a.txt")), h);
/// assert_eq!(registry.path_for(h).unwrap(), Path::new("/data/a.txt"));
/// ```
#[derive(Default)]
pub struct HandleRegistry {
    table: RwLock<Table>,
}

impl HandleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `path`, minting one on first use.
    pub fn handle_for(&self, path: &Path) -> FileHandle {
        if let Some(handle) = self.read_table().by_path.get(path) {
            return *handle;
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have minted between the two locks.
        if let Some(handle) = table.by_path.get(path) {
            return *handle;
        }
        let handle = loop {
            let candidate = FileHandle::random();
            if !table.by_handle.contains_key(&candidate) {
                break candidate;
            }
        };
        table.by_path.insert(path.to_path_buf(), handle);
        table.by_handle.insert(handle, path.to_path_buf());
        trace!(path = %path.display(), %handle, "minted handle");
        handle
    }

    /// Path previously associated with `handle`.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle was never minted here
    pub fn path_for(&self, handle: FileHandle) -> Result<PathBuf, FsError> {
        self.read_table()
            .by_handle
            .get(&handle)
            .cloned()
            .ok_or(FsError::StaleHandle { handle })
    }

    /// Node for `path`, minting its handle on first use.
    pub fn node(&self, path: impl Into<PathBuf>) -> Node {
        let path = path.into();
        let handle = self.handle_for(&path);
        Node::new(path, handle)
    }

    /// Node for a previously minted handle.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle was never minted here
    pub fn resolve(&self, handle: FileHandle) -> Result<Node, FsError> {
        Ok(Node::new(self.path_for(handle)?, handle))
    }

    /// Number of paths with a handle.
    pub fn len(&self) -> usize {
        self.read_table().by_path.len()
    }

    /// Returns `true` if no handle has been minted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_table(&self) -> std::sync::RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("len", &self.len())
            .finish()
    }
}
