//! # Backing Store Traits
//!
//! The downward contract the adapter consumes from a path-addressed store.
//!
//! ## Trait Layout
//!
//! ```text
//! StoreRead + StoreWrite + StoreDir = BackingStore
//! ```
//!
//! | Trait | Operations |
//! |-------|------------|
//! | [`StoreRead`] | `exists`, `status`, `open`, `is_file` |
//! | [`StoreWrite`] | `create_new_file`, `create`, `delete` |
//! | [`StoreDir`] | `mkdirs`, `list_status` |
//! | [`ReadStream`] | `read_at`, `close` on an open object |
//!
//! ## Blanket Implementation
//!
//! Implement the three component traits and [`BackingStore`] follows:
//!
//! ```rust
//! use handlefs::{BackingStore, FileStatus, FsError, ReadStream, StoreDir, StoreRead, StoreWrite};
//! use std::path::Path;
//!
//! struct EmptyStore;
//!
//! # impl StoreRead for EmptyStore {
//! #     fn exists(&self, _: &Path) -> Result<bool, FsError> { Ok(false) }
//! #     fn status(&self, p: &Path) -> Result<FileStatus, FsError> { Err(FsError::NotFound { path: p.into() }) }
//! #     fn open(&self, p: &Path) -> Result<Box<dyn ReadStream>, FsError> { Err(FsError::NotFound { path: p.into() }) }
//! # }
//! # impl StoreWrite for EmptyStore {
//! #     fn create_new_file(&self, _: &Path) -> Result<bool, FsError> { Ok(false) }
//! #     fn create(&self, _: &Path) -> Result<Box<dyn std::io::Write + Send>, FsError> { Ok(Box::new(std::io::sink())) }
//! #     fn delete(&self, _: &Path) -> Result<bool, FsError> { Ok(false) }
//! # }
//! # impl StoreDir for EmptyStore {
//! #     fn mkdirs(&self, _: &Path) -> Result<bool, FsError> { Ok(true) }
//! #     fn list_status(&self, _: &Path) -> Result<Vec<FileStatus>, FsError> { Ok(vec![]) }
//! # }
//! fn use_store<S: BackingStore>(_store: &S) {}
//! use_store(&EmptyStore);
//! ```
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` and take `&self`. The adapter calls the
//! store from many protocol workers at once; every call may block.

mod store_dir;
mod store_read;
mod store_write;

pub use store_dir::StoreDir;
pub use store_read::{ReadStream, StoreRead};
pub use store_write::StoreWrite;

/// A complete path-addressed backing store.
///
/// Automatically implemented for any type implementing [`StoreRead`],
/// [`StoreWrite`] and [`StoreDir`].
pub trait BackingStore: StoreRead + StoreWrite + StoreDir {}

impl<T: StoreRead + StoreWrite + StoreDir> BackingStore for T {}
