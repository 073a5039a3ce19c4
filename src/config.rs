//! Construction-time configuration.
//!
//! The adapter takes exactly one external input, the backing store endpoint.
//! The read-stream cache bound is a deployment parameter riding along with it.

use std::time::Duration;

use url::Url;

use crate::FsError;

/// Default bound on cached open read streams.
pub const DEFAULT_MAX_STREAMS: u64 = 1024;

/// Bound on the open-stream cache.
///
/// `None` for a field means that dimension is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReadCacheConfig {
    /// Maximum number of open streams kept.
    pub max_streams: Option<u64>,
    /// Close streams unused for this long.
    pub idle_timeout: Option<Duration>,
}

impl ReadCacheConfig {
    /// No capacity or idle bound.
    pub const fn unbounded() -> Self {
        Self {
            max_streams: None,
            idle_timeout: None,
        }
    }

    /// Keep at most `max` streams open.
    pub fn with_max_streams(mut self, max: u64) -> Self {
        self.max_streams = Some(max);
        self
    }

    /// Close streams unused for `idle`.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = Some(idle);
        self
    }
}

impl Default for ReadCacheConfig {
    fn default() -> Self {
        Self {
            max_streams: Some(DEFAULT_MAX_STREAMS),
            idle_timeout: None,
        }
    }
}

/// Adapter configuration.
///
/// # Example
///
/// ```rust
/// use handlefs::AdapterConfig;
///
/// let config = AdapterConfig::new("file:///srv/export").unwrap();
/// assert_eq!(config.endpoint.scheme(), "file");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdapterConfig {
    /// Backing store connection endpoint.
    pub endpoint: Url,
    /// Open-stream cache bound.
    #[cfg_attr(feature = "serde", serde(default))]
    pub read_cache: ReadCacheConfig,
}

impl AdapterConfig {
    /// Configuration for `endpoint` with the default cache bound.
    ///
    /// # Errors
    ///
    /// - [`FsError::Backend`] if `endpoint` is not a valid URI
    pub fn new(endpoint: &str) -> Result<Self, FsError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FsError::Backend(format!("invalid endpoint {endpoint:?}: {e}")))?;
        Ok(Self {
            endpoint,
            read_cache: ReadCacheConfig::default(),
        })
    }

    /// Replace the cache bound.
    pub fn with_read_cache(mut self, read_cache: ReadCacheConfig) -> Self {
        self.read_cache = read_cache;
        self
    }

    /// Parse a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// - [`FsError::Backend`] if the document does not describe a configuration
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, FsError> {
        serde_json::from_str(json).map_err(|e| FsError::Backend(format!("invalid config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_is_bounded() {
        let config = ReadCacheConfig::default();
        assert_eq!(config.max_streams, Some(DEFAULT_MAX_STREAMS));
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn builders_set_bounds() {
        let config = ReadCacheConfig::unbounded()
            .with_max_streams(8)
            .with_idle_timeout(Duration::from_secs(30));
        assert_eq!(config.max_streams, Some(8));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn new_parses_endpoint() {
        let config = AdapterConfig::new("hdfs://namenode:9000").unwrap();
        assert_eq!(config.endpoint.scheme(), "hdfs");
        assert_eq!(config.endpoint.host_str(), Some("namenode"));
        assert_eq!(config.endpoint.port(), Some(9000));
    }

    #[test]
    fn new_rejects_garbage() {
        assert!(AdapterConfig::new("not a uri").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn from_json_fills_defaults() {
        let config = AdapterConfig::from_json(r#"{"endpoint": "memory:"}"#).unwrap();
        assert_eq!(config.endpoint.scheme(), "memory");
        assert_eq!(config.read_cache, ReadCacheConfig::default());
    }
}
