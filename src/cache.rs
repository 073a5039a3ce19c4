//! # Open-Stream Cache
//!
//! Keeps one open [`ReadStream`] per path so that reads do not reopen the
//! remote object on every call.
//!
//! ## Invariants
//! - At most one cached stream per path. Concurrent misses for the same path
//!   collapse into a single open (`moka`'s `try_get_with` coalesces loaders).
//! - Every stream leaving the cache is closed, whatever the cause: capacity,
//!   idle expiry, explicit invalidation, or teardown. A close failure is
//!   logged and dropped.
//! - An acquire that starts after [`StreamCache::invalidate`] returns never
//!   sees a stream opened before it. Entries are keyed by path and a per-path
//!   generation that `invalidate` bumps, so a load still running across an
//!   invalidation lands under a dead key and is discarded by its own caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use moka::notification::RemovalCause;
use moka::sync::Cache;
use tracing::{debug, trace, warn};

use crate::{FsError, ReadCacheConfig, ReadStream};

type Key = (PathBuf, u64);

/// Path-keyed cache of open read streams.
pub struct StreamCache {
    streams: Cache<Key, Arc<dyn ReadStream>>,
    generations: RwLock<HashMap<PathBuf, u64>>,
}

impl StreamCache {
    /// Build a cache bounded as `config` describes.
    pub fn new(config: &ReadCacheConfig) -> Self {
        let mut builder = Cache::<Key, Arc<dyn ReadStream>>::builder().eviction_listener(
            |key: Arc<Key>, stream: Arc<dyn ReadStream>, cause: RemovalCause| {
                let path = &key.0;
                debug!(path = %path.display(), generation = key.1, ?cause, "closing cached stream");
                if let Err(e) = stream.close() {
                    warn!(path = %path.display(), error = %e, "failed to close evicted stream");
                }
            },
        );
        if let Some(max) = config.max_streams {
            builder = builder.max_capacity(max);
        }
        if let Some(idle) = config.idle_timeout {
            builder = builder.time_to_idle(idle);
        }
        Self {
            streams: builder.build(),
            generations: RwLock::new(HashMap::new()),
        }
    }

    /// Cached stream for `path`, calling `open` on a miss.
    ///
    /// Concurrent callers missing on the same path share one `open` call and
    /// its outcome. If the path is invalidated while `open` runs, the freshly
    /// opened stream is closed and `open` runs again.
    ///
    /// # Errors
    ///
    /// Whatever `open` fails with; a failed open caches nothing.
    pub fn acquire<F>(&self, path: &Path, open: F) -> Result<Arc<dyn ReadStream>, FsError>
    where
        F: Fn() -> Result<Box<dyn ReadStream>, FsError>,
    {
        loop {
            let generation = self.generation(path);
            let key = (path.to_path_buf(), generation);
            let stream = self
                .streams
                .try_get_with(key.clone(), || {
                    debug!(path = %path.display(), generation, "stream cache miss");
                    open().map(Arc::from)
                })
                .map_err(|shared| Arc::try_unwrap(shared).unwrap_or_else(|e| e.duplicate()))?;
            if self.generation(path) == generation {
                return Ok(stream);
            }
            // Invalidated mid-open; the stream may predate the change.
            trace!(path = %path.display(), generation, "discarding stream opened across invalidation");
            self.streams.invalidate(&key);
        }
    }

    /// Evict and close the stream cached for `path`, if any.
    ///
    /// Opens of `path` still in flight are discarded when they complete.
    pub fn invalidate(&self, path: &Path) {
        let previous = {
            let mut generations = self
                .generations
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let generation = generations.entry(path.to_path_buf()).or_insert(0);
            *generation += 1;
            *generation - 1
        };
        self.streams.invalidate(&(path.to_path_buf(), previous));
    }

    /// Returns `true` if a current stream for `path` is cached.
    pub fn contains(&self, path: &Path) -> bool {
        self.streams
            .contains_key(&(path.to_path_buf(), self.generation(path)))
    }

    /// Evict and close every cached stream.
    pub fn close_all(&self) {
        let keys: Vec<Arc<Key>> = self.streams.iter().map(|(key, _)| key).collect();
        for key in keys {
            self.streams.invalidate(key.as_ref());
        }
        self.streams.run_pending_tasks();
    }

    /// Run pending evictions (capacity and idle expiry) now.
    pub fn run_pending_evictions(&self) {
        self.streams.run_pending_tasks();
    }

    fn generation(&self, path: &Path) -> u64 {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for StreamCache {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for StreamCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCache")
            .field("entries", &self.streams.entry_count())
            .finish()
    }
}
