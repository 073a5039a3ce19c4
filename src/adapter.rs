//! # Filesystem Adapter
//!
//! The handle-addressed operation set a network filesystem protocol calls,
//! translated onto a path-addressed [`BackingStore`].
//!
//! ## Flow
//!
//! ```text
//! protocol ──handle──▶ FsAdapter ──path──▶ BackingStore
//!              ▲          │
//!              │          ├── HandleRegistry  (handle <-> path)
//!              └─ Node ◀──┴── StreamCache     (open read streams)
//! ```
//!
//! Every call first resolves its handle through the [`HandleRegistry`]; an
//! unknown handle fails with [`FsError::StaleHandle`]. Paths seen for the
//! first time (lookup, create, listing) get a handle minted on the way out.
//!
//! ## Blocking
//!
//! Every store call blocks the calling worker. There are no timeouts and no
//! retries beyond reopening a cached stream once after a read failure.
//!
//! ## Example
//!
//! ```rust
//! use handlefs::{CreateAttrs, FileType, FsAdapter, HandleRegistry, MemoryStore, ReadCacheConfig};
//! use std::sync::Arc;
//!
//! let fs = FsAdapter::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(HandleRegistry::new()),
//!     &ReadCacheConfig::default(),
//! );
//! let root = fs.root();
//! let file = fs.create(root.handle(), "a.txt", FileType::Regular, CreateAttrs::default()).unwrap();
//! fs.write(file.handle(), 0, b"hello").unwrap();
//! assert_eq!(fs.read(file.handle(), 0, 5).unwrap(), b"hello");
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::backends;
use crate::{
    AdapterConfig, BackingStore, CreateAttrs, DirEntry, FileHandle, FileType, FsError, FsStat,
    HandleRegistry, Node, ROOT_PATH, ReadCacheConfig, ReadStream, SetAttr, Stat, StoreDir,
    StoreRead, StoreWrite, StreamCache,
};

/// Handle-addressed filesystem over a path-addressed store.
///
/// # Thread Safety
///
/// All methods take `&self`; share one adapter across protocol workers with
/// an `Arc`.
pub struct FsAdapter<S: ?Sized> {
    store: Arc<S>,
    registry: Arc<HandleRegistry>,
    readers: StreamCache,
}

impl FsAdapter<dyn BackingStore> {
    /// Connect to the store named by `config` with a fresh registry.
    ///
    /// # Errors
    ///
    /// See [`connect`](crate::connect).
    pub fn connect(config: &AdapterConfig) -> Result<Self, FsError> {
        let store = backends::connect(config)?;
        Ok(Self::new(
            store,
            Arc::new(HandleRegistry::new()),
            &config.read_cache,
        ))
    }
}

impl<S: ?Sized> FsAdapter<S> {
    /// The handle registry this adapter mints into.
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The open-stream cache.
    pub fn readers(&self) -> &StreamCache {
        &self.readers
    }
}

impl<S: BackingStore + ?Sized> FsAdapter<S> {
    /// Serve `store`, minting handles into `registry`.
    pub fn new(store: Arc<S>, registry: Arc<HandleRegistry>, read_cache: &ReadCacheConfig) -> Self {
        Self {
            store,
            registry,
            readers: StreamCache::new(read_cache),
        }
    }

    /// Node for the exported root.
    pub fn root(&self) -> Node {
        self.registry.node(ROOT_PATH)
    }

    /// Node for a handle minted earlier.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle is unknown
    pub fn node_of(&self, handle: FileHandle) -> Result<Node, FsError> {
        self.registry.resolve(handle)
    }

    /// Node for a handle in its 16-byte wire form.
    ///
    /// # Errors
    ///
    /// - [`FsError::MalformedHandle`] if `bytes` is not 16 bytes long
    /// - [`FsError::StaleHandle`] if the handle is unknown
    pub fn node_from_bytes(&self, bytes: &[u8]) -> Result<Node, FsError> {
        self.registry.resolve(FileHandle::from_bytes(bytes)?)
    }

    /// Find `name` inside the directory `parent`.
    ///
    /// `"."` names the directory itself and `".."` its parent. Any stream
    /// cached for the child is dropped, so the next read reopens it.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if no such child exists
    /// - [`FsError::InvalidName`] if `name` is empty or contains `/`
    pub fn lookup(&self, parent: FileHandle, name: &str) -> Result<Node, FsError> {
        let dir = self.path_of(parent)?;
        match name {
            "." => return Ok(Node::new(dir, parent)),
            ".." => return Ok(self.parent_node(&dir)),
            _ => {}
        }
        let path = child_path(&dir, name)?;
        // A name lookup revalidates: later reads reopen against the store.
        self.readers.invalidate(&path);
        if !self.store.exists(&path)? {
            return Err(FsError::NotFound { path });
        }
        Ok(self.registry.node(path))
    }

    /// Create an empty object called `name` inside `parent`.
    ///
    /// `attrs` is advisory and not persisted. A `Directory` request is
    /// served by [`mkdir`](Self::mkdir).
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyExists`] if something already exists there
    /// - [`FsError::NotSupported`] for links, devices, sockets and fifos
    /// - [`FsError::Io`] if the store refuses without the object existing
    pub fn create(
        &self,
        parent: FileHandle,
        name: &str,
        file_type: FileType,
        attrs: CreateAttrs,
    ) -> Result<Node, FsError> {
        match file_type {
            FileType::Regular => {}
            FileType::Directory => return self.mkdir(parent, name, attrs),
            _ => return Err(FsError::NotSupported { operation: "create" }),
        }
        let path = child_path(&self.path_of(parent)?, name)?;
        trace!(path = %path.display(), ?attrs, "create");

        if self.store.create_new_file(&path)? {
            debug!(path = %path.display(), "created file");
            return Ok(self.registry.node(path));
        }
        if self.store.exists(&path)? {
            return Err(FsError::AlreadyExists {
                path,
                operation: "create",
            });
        }
        Err(FsError::Io {
            operation: "create",
            path,
            source: io::Error::other("store refused to create file"),
        })
    }

    /// Create the directory `name` inside `parent`.
    ///
    /// Succeeds if the directory already exists. `attrs` is advisory.
    ///
    /// # Errors
    ///
    /// - [`FsError::Io`] (or a more specific store error) on failure
    pub fn mkdir(&self, parent: FileHandle, name: &str, attrs: CreateAttrs) -> Result<Node, FsError> {
        let path = child_path(&self.path_of(parent)?, name)?;
        trace!(path = %path.display(), ?attrs, "mkdir");

        if !self.store.mkdirs(&path)? {
            return Err(FsError::Io {
                operation: "mkdir",
                path,
                source: io::Error::other("store refused to create directory"),
            });
        }
        debug!(path = %path.display(), "created directory");
        Ok(self.registry.node(path))
    }

    /// Immediate children of the directory `dir`, in store order.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the directory vanished
    pub fn list(&self, dir: FileHandle) -> Result<Vec<DirEntry>, FsError> {
        let path = self.path_of(dir)?;
        let entries = self
            .store
            .list_status(&path)?
            .into_iter()
            .map(|status| DirEntry {
                name: status.name(),
                node: self.registry.node(status.path),
            })
            .collect::<Vec<_>>();
        trace!(path = %path.display(), count = entries.len(), "list");
        Ok(entries)
    }

    /// Delete `name` from `parent`. Never recursive.
    ///
    /// Returns `Ok(false)` if nothing was deleted (missing object, non-empty
    /// directory). The handle of the deleted path stays registered.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if `parent` is unknown
    /// - [`FsError::Io`] on store failures other than the two above
    pub fn remove(&self, parent: FileHandle, name: &str) -> Result<bool, FsError> {
        let path = child_path(&self.path_of(parent)?, name)?;
        let removed = self.store.delete(&path)?;
        self.readers.invalidate(&path);
        debug!(path = %path.display(), removed, "remove");
        Ok(removed)
    }

    /// Read up to `len` bytes at `offset` through the stream cache.
    ///
    /// Returns fewer bytes than asked (possibly none) at end of object.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle is unknown
    /// - [`FsError::NotFound`] if the object no longer exists
    pub fn read(&self, handle: FileHandle, offset: u64, len: usize) -> Result<Vec<u8>, FsError> {
        let path = self.path_of(handle)?;

        let stream = self.reader(&path)?;
        let buf = match fill(stream.as_ref(), offset, len) {
            Ok(buf) => buf,
            Err(e) => {
                // The cached stream may have been closed under us; reopen once.
                debug!(path = %path.display(), error = %e, "cached stream failed, reopening");
                self.readers.invalidate(&path);
                let stream = self.reader(&path)?;
                fill(stream.as_ref(), offset, len)?
            }
        };
        trace!(path = %path.display(), offset, len, read = buf.len(), "read");
        Ok(buf)
    }

    /// Write `data` through a fresh write stream and close it.
    ///
    /// The store writes sequentially from the start of the object: the
    /// object is replaced by `data` and `offset` is not honoured. Any cached
    /// read stream for the path is dropped so later reads see the new data.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle is unknown
    /// - [`FsError::Io`] if the store cannot open, write or close the stream
    pub fn write(&self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<usize, FsError> {
        let path = self.path_of(handle)?;
        if offset != 0 {
            warn!(path = %path.display(), offset, "store writes from the start; offset ignored");
        }

        let mut out = self.store.create(&path)?;
        out.write_all(data)
            .and_then(|()| out.flush())
            .map_err(|e| FsError::io("write", &path, e))?;
        drop(out);

        self.readers.invalidate(&path);
        debug!(path = %path.display(), bytes = data.len(), "write");
        Ok(data.len())
    }

    /// Parent directory of `handle`; the root is its own parent.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle is unknown
    pub fn parent_of(&self, handle: FileHandle) -> Result<Node, FsError> {
        let path = self.path_of(handle)?;
        Ok(self.parent_node(&path))
    }

    /// Attributes of `handle` with a synthesized `rwxrwxrwx` mode.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle is unknown
    /// - [`FsError::NotFound`] if the object no longer exists
    pub fn stat(&self, handle: FileHandle) -> Result<Stat, FsError> {
        let node = self.node_of(handle)?;
        let status = self.store.status(node.path())?;
        Ok(Stat::from_status(&node, &status))
    }

    /// Accept and discard attribute changes.
    pub fn set_attr(&self, handle: FileHandle, attrs: SetAttr) -> Result<(), FsError> {
        trace!(%handle, ?attrs, "set_attr ignored");
        Ok(())
    }

    /// Whether `handle` names an object that still exists.
    ///
    /// Unknown handles and store failures read as `false`.
    pub fn exists(&self, handle: FileHandle) -> bool {
        self.path_of(handle)
            .and_then(|path| self.store.exists(&path))
            .unwrap_or(false)
    }

    /// `Regular` if the store reports a plain file, `Directory` otherwise.
    ///
    /// A failing store query reads as `Regular`.
    ///
    /// # Errors
    ///
    /// - [`FsError::StaleHandle`] if the handle is unknown
    pub fn node_type(&self, handle: FileHandle) -> Result<FileType, FsError> {
        let path = self.path_of(handle)?;
        Ok(match self.store.is_file(&path) {
            Ok(false) => FileType::Directory,
            Ok(true) | Err(_) => FileType::Regular,
        })
    }

    /// Filesystem-wide capacity. Not supported.
    pub fn fs_stat(&self) -> Result<FsStat, FsError> {
        Err(FsError::NotSupported {
            operation: "fs_stat",
        })
    }

    /// Target of a symbolic link. Not supported.
    pub fn read_link(&self, _handle: FileHandle) -> Result<PathBuf, FsError> {
        Err(FsError::NotSupported {
            operation: "read_link",
        })
    }

    /// Create a symbolic link. Not supported.
    pub fn symlink(
        &self,
        _parent: FileHandle,
        _name: &str,
        _target: &str,
        _attrs: CreateAttrs,
    ) -> Result<Node, FsError> {
        Err(FsError::NotSupported {
            operation: "symlink",
        })
    }

    /// Create a hard link. Not supported.
    pub fn hard_link(
        &self,
        _parent: FileHandle,
        _target: FileHandle,
        _name: &str,
    ) -> Result<Node, FsError> {
        Err(FsError::NotSupported {
            operation: "hard_link",
        })
    }

    /// Move an object. Not supported.
    pub fn rename(
        &self,
        _from_dir: FileHandle,
        _from_name: &str,
        _to_dir: FileHandle,
        _to_name: &str,
    ) -> Result<(), FsError> {
        Err(FsError::NotSupported {
            operation: "rename",
        })
    }

    fn path_of(&self, handle: FileHandle) -> Result<PathBuf, FsError> {
        self.registry.path_for(handle)
    }

    fn parent_node(&self, path: &Path) -> Node {
        match path.parent() {
            Some(parent) => self.registry.node(parent),
            None => self.root(),
        }
    }

    fn reader(&self, path: &Path) -> Result<Arc<dyn ReadStream>, FsError> {
        self.readers.acquire(path, || self.store.open(path))
    }
}

/// Join `name` onto `dir`, refusing anything but a single component.
fn child_path(dir: &Path, name: &str) -> Result<PathBuf, FsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(FsError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(dir.join(name))
}

/// Largest slice handed to a single positional read.
const READ_CHUNK: usize = 64 * 1024;

/// Positional reads from `offset` until `len` bytes or the end of the object.
///
/// The buffer grows with the bytes actually read, so an oversized `len`
/// costs nothing against a short object.
fn fill(stream: &dyn ReadStream, offset: u64, len: usize) -> Result<Vec<u8>, FsError> {
    let mut out = Vec::with_capacity(len.min(READ_CHUNK));
    let mut chunk = vec![0u8; len.min(READ_CHUNK)];
    while out.len() < len {
        let want = (len - out.len()).min(chunk.len());
        let n = stream.read_at(&mut chunk[..want], offset + out.len() as u64)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}
