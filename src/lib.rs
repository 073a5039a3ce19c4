//! # handlefs
//!
//! Path-to-handle translation and read-stream caching that lets a stateless,
//! handle-addressed network filesystem protocol (NFS-style) serve a backing
//! store that only understands hierarchical paths.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use handlefs::{AdapterConfig, BackingStore, CreateAttrs, FileType, FsAdapter};
//!
//! let config = AdapterConfig::new("memory:")?;
//! let fs = FsAdapter::<dyn BackingStore>::connect(&config)?;
//!
//! let root = fs.root();
//! let file = fs.create(root.handle(), "a.txt", FileType::Regular, CreateAttrs::default())?;
//! assert_eq!(fs.stat(file.handle())?.size, 0);
//!
//! // Handles travel as 16 opaque bytes and resolve back to the same node.
//! let wire = file.to_bytes();
//! assert_eq!(fs.node_from_bytes(&wire)?, file);
//! # Ok::<(), handlefs::FsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`FsAdapter`] | Protocol-facing operations: lookup, list, create, read, write, stat, ... |
//! | [`HandleRegistry`] | Path <-> handle bijection, minting on first exposure |
//! | [`StreamCache`] | One open read stream per path, closed on eviction |
//! | [`BackingStore`] | Downward contract: [`StoreRead`] + [`StoreWrite`] + [`StoreDir`] |
//! | [`FileHandle`] | Opaque 128-bit handle, 16 bytes on the wire |
//! | [`Node`] | A path paired with its handle |
//! | [`FsError`] | Contextual error; [`FsError::kind`] gives the protocol-visible [`ErrorKind`] |
//!
//! ---
//!
//! ## Handles
//!
//! A handle is minted at random the first time a path is exposed and then
//! never changes or gets reused for another path. The registry keeps every
//! handle for the life of the process; a handle whose object was deleted
//! still resolves to its path and the store reports the object missing.
//!
//! ---
//!
//! ## Reads and Writes
//!
//! Reads go through a cache of open streams keyed by path and use positional
//! reads, so concurrent reads at different offsets share one stream. Writes
//! open a fresh stream per call, replace the object from its start and close
//! the stream; they never touch the read cache except to invalidate it.
//! A name `lookup` also drops the cached stream for the child, so a read
//! issued after a lookup never serves bytes of an object deleted meanwhile.
//!
//! ---
//!
//! ## Unsupported Operations
//!
//! Symbolic links, hard links, rename and filesystem statistics fail with
//! [`FsError::NotSupported`]. Attribute setters succeed without effect.
//!
//! ---
//!
//! ## Thread Safety
//!
//! Everything takes `&self` and is `Send + Sync`. Every store call blocks
//! the calling thread; run the adapter on worker threads.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for [`AdapterConfig`], [`Stat`], [`FileHandle`], and `AdapterConfig::from_json` |

// Private modules
mod adapter;
mod backends;
mod cache;
mod config;
mod error;
mod registry;
mod traits;
mod types;

// Public re-exports - error types
pub use error::{ErrorKind, FsError};

// Public re-exports - core types
pub use types::{
    ALL_ACCESS, CreateAttrs, DirEntry, FileHandle, FileStatus, FileType, FsStat, HANDLE_LEN,
    Node, ROOT_PATH, S_IFDIR, S_IFREG, SetAttr, Stat,
};

// Public re-exports - backing store contract
pub use traits::{BackingStore, ReadStream, StoreDir, StoreRead, StoreWrite};

// Public re-exports - identity and caching
pub use cache::StreamCache;
pub use registry::HandleRegistry;

// Public re-exports - adapter and configuration
pub use adapter::FsAdapter;
pub use config::{AdapterConfig, DEFAULT_MAX_STREAMS, ReadCacheConfig};

// Public re-exports - concrete stores
pub use backends::{LocalStore, MemoryStore, connect};
