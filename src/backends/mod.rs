//! # Backing Stores
//!
//! Concrete [`BackingStore`] implementations and endpoint-based selection.
//!
//! | Scheme | Store |
//! |--------|-------|
//! | `file:///dir` | [`LocalStore`] rooted at `dir` |
//! | `memory:` | empty [`MemoryStore`] |
//!
//! Distributed filesystem clients live outside this crate; wrap one in the
//! [`StoreRead`](crate::StoreRead), [`StoreWrite`](crate::StoreWrite) and
//! [`StoreDir`](crate::StoreDir) traits and hand it to
//! [`FsAdapter::new`](crate::FsAdapter::new).

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{AdapterConfig, BackingStore, FsError};

/// Connect to the store named by `config.endpoint`.
///
/// # Errors
///
/// - [`FsError::NotSupported`] if no store in this crate speaks the scheme
/// - [`FsError::NotFound`] if a `file:` root does not exist
/// - [`FsError::Backend`] if a `file:` URI has no local path
pub fn connect(config: &AdapterConfig) -> Result<Arc<dyn BackingStore>, FsError> {
    let endpoint = &config.endpoint;
    debug!(%endpoint, "connecting to backing store");
    match endpoint.scheme() {
        "file" => {
            let root = endpoint
                .to_file_path()
                .map_err(|()| FsError::Backend(format!("no local path in {endpoint}")))?;
            Ok(Arc::new(LocalStore::new(root)?))
        }
        "memory" => Ok(Arc::new(MemoryStore::new())),
        scheme => {
            warn!(%scheme, "no backing store for endpoint scheme");
            Err(FsError::NotSupported {
                operation: "connect",
            })
        }
    }
}
