//! On-disk HTTP response cache.
//!
//! [`HttpCache`] stores request/response pairs in a Scrapy-compatible
//! directory-per-key layout (see [`layout`]) so two processes sharing a
//! cache directory observe the same entries and external tools can inspect
//! or reuse them.
//!
//! Behavioural contract:
//!
//! - a disabled cache is inert: every `get` is a miss, `store` is a no-op,
//!   `size` is 0;
//! - expiry is lazy: an entry past its ttl is reported as a miss but is not
//!   deleted on the read path (deletion is explicit via [`delete`] or
//!   [`clear`]), so reads never mutate shared state;
//! - corrupted or unreadable entries surface as [`CacheError`] so the
//!   caller can emit a cache-error event and proceed as a miss;
//! - concurrent reads of one key need no exclusion, and concurrent writes
//!   are last-write-wins; responses for an identical key are
//!   interchangeable.
//!
//! [`delete`]: HttpCache::delete
//! [`clear`]: HttpCache::clear

pub mod layout;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::Response;
use crate::error::CacheError;

pub use layout::{CacheKey, request_fingerprint};

use layout::{
    EntryMeta, META_FILE, REQUEST_BODY_FILE, REQUEST_HEADERS_FILE, RESPONSE_BODY_FILE,
    RESPONSE_BODY_GZ_FILE, RESPONSE_HEADERS_FILE,
};

type CacheResult<T> = std::result::Result<T, CacheError>;

/// Configuration for the on-disk cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .enabled(true)
///     .dir("httpcache")
///     .compress(true)
///     .expiry(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is active. Default: false.
    pub enabled: bool,
    /// Directory holding the entry tree. Default: `httpcache`.
    pub dir: PathBuf,
    /// Gzip-compress stored response bodies. Default: false.
    pub compress: bool,
    /// Entry time-to-live; `None` means entries never expire.
    pub expiry: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("httpcache"),
            compress: false,
            expiry: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with defaults (disabled, `httpcache` dir).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the cache.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the cache directory.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Enable or disable gzip compression of stored bodies.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the entry time-to-live.
    pub fn expiry(mut self, ttl: Duration) -> Self {
        self.expiry = Some(ttl);
        self
    }
}

/// Content-addressed, optionally compressed, on-disk response store.
pub struct HttpCache {
    config: CacheConfig,
}

impl HttpCache {
    /// Create a cache over the configured directory, creating it when the
    /// cache is enabled.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        if config.enabled {
            std::fs::create_dir_all(&config.dir).map_err(|e| {
                CacheError::new(
                    "create",
                    format!("failed to create cache directory: {e}"),
                    config.dir.display().to_string(),
                )
            })?;
        }
        Ok(Self { config })
    }

    /// Whether this cache is active.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.config.dir.join(key.as_str())
    }

    fn read_error(&self, reason: impl std::fmt::Display) -> CacheError {
        CacheError::new(
            "read",
            reason.to_string(),
            self.config.dir.display().to_string(),
        )
    }

    fn write_error(&self, reason: impl std::fmt::Display) -> CacheError {
        CacheError::new(
            "write",
            reason.to_string(),
            self.config.dir.display().to_string(),
        )
    }

    /// Look up the cached response for a key.
    ///
    /// Returns `Ok(None)` on miss or lazy expiry; `Err` only for corrupted
    /// or unreadable entries, which callers absorb as misses.
    pub async fn get(&self, key: &CacheKey) -> CacheResult<Option<Response>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let entry = self.entry_dir(key);
        let meta_path = entry.join(META_FILE);
        let meta_bytes = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.read_error(format!("failed to read {META_FILE}: {e}"))),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| self.read_error(format!("corrupt {META_FILE}: {e}")))?;

        if self.is_expired(&meta) {
            debug!(key = %key, "cache entry expired");
            return Ok(None);
        }

        let headers_bytes = match tokio::fs::read(entry.join(RESPONSE_HEADERS_FILE)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(self.read_error(format!("failed to read {RESPONSE_HEADERS_FILE}: {e}")));
            }
        };
        let headers: BTreeMap<String, String> = serde_json::from_slice(&headers_bytes)
            .map_err(|e| self.read_error(format!("corrupt {RESPONSE_HEADERS_FILE}: {e}")))?;

        let body = match self.read_body(&entry).await? {
            Some(body) => body,
            None => return Ok(None),
        };

        Ok(Some(Response {
            url: meta.url,
            status: meta.status_code,
            reason: meta.reason,
            headers,
            body,
            from_cache: true,
        }))
    }

    /// Read the stored body, preferring the compressed file when present.
    ///
    /// Entries written without compression stay readable after compression
    /// is enabled, and vice versa.
    async fn read_body(&self, entry: &Path) -> CacheResult<Option<Vec<u8>>> {
        match tokio::fs::read(entry.join(RESPONSE_BODY_GZ_FILE)).await {
            Ok(bytes) => {
                let body = layout::gunzip(&bytes)
                    .map_err(|e| self.read_error(format!("corrupt {RESPONSE_BODY_GZ_FILE}: {e}")))?;
                return Ok(Some(body));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(self.read_error(format!("failed to read {RESPONSE_BODY_GZ_FILE}: {e}")));
            }
        }
        match tokio::fs::read(entry.join(RESPONSE_BODY_FILE)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.read_error(format!("failed to read {RESPONSE_BODY_FILE}: {e}"))),
        }
    }

    fn is_expired(&self, meta: &EntryMeta) -> bool {
        let Some(ttl) = self.config.expiry else {
            return false;
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        now - meta.timestamp > ttl.as_secs_f64()
    }

    /// Store a response under a key, overwriting any previous entry.
    pub async fn store(
        &self,
        key: &CacheKey,
        method: &str,
        request_headers: &BTreeMap<String, String>,
        request_body: &[u8],
        response: &Response,
    ) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let entry = self.entry_dir(key);
        tokio::fs::create_dir_all(&entry)
            .await
            .map_err(|e| self.write_error(format!("failed to create entry directory: {e}")))?;

        let request_headers_json = serde_json::to_vec(request_headers)
            .map_err(|e| self.write_error(format!("failed to encode request headers: {e}")))?;
        let response_headers_json = serde_json::to_vec(&response.headers)
            .map_err(|e| self.write_error(format!("failed to encode response headers: {e}")))?;

        let meta = EntryMeta {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64(),
            method: method.to_ascii_uppercase(),
            url: response.url.clone(),
            status_code: response.status,
            reason: response.reason.clone(),
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| self.write_error(format!("failed to encode meta: {e}")))?;

        self.write_file(&entry.join(REQUEST_BODY_FILE), request_body)
            .await?;
        self.write_file(&entry.join(REQUEST_HEADERS_FILE), &request_headers_json)
            .await?;
        if self.config.compress {
            let compressed = layout::gzip(&response.body)
                .map_err(|e| self.write_error(format!("failed to compress body: {e}")))?;
            self.write_file(&entry.join(RESPONSE_BODY_GZ_FILE), &compressed)
                .await?;
            self.remove_stale(&entry.join(RESPONSE_BODY_FILE)).await?;
        } else {
            self.write_file(&entry.join(RESPONSE_BODY_FILE), &response.body)
                .await?;
            self.remove_stale(&entry.join(RESPONSE_BODY_GZ_FILE)).await?;
        }
        self.write_file(&entry.join(RESPONSE_HEADERS_FILE), &response_headers_json)
            .await?;
        self.write_file(&entry.join(META_FILE), &meta_json).await?;

        debug!(key = %key, status = response.status, "cache entry stored");
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> CacheResult<()> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| self.write_error(format!("failed to write {}: {e}", path.display())))
    }

    /// Remove the body variant not written by this store, so overwriting an
    /// entry never leaves a stale file that `read_body` would prefer.
    async fn remove_stale(&self, path: &Path) -> CacheResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(self.write_error(format!("failed to remove {}: {e}", path.display())))
            }
        }
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        let entry = self.entry_dir(key);
        match tokio::fs::remove_dir_all(&entry).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::new(
                "delete",
                format!("failed to delete entry: {e}"),
                self.config.dir.display().to_string(),
            )),
        }
    }

    /// Remove every entry, leaving an empty cache directory behind.
    pub async fn clear(&self) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let clear_error = |e: std::io::Error| {
            CacheError::new(
                "clear",
                format!("failed to clear cache: {e}"),
                self.config.dir.display().to_string(),
            )
        };
        match tokio::fs::remove_dir_all(&self.config.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(clear_error(e)),
        }
        tokio::fs::create_dir_all(&self.config.dir)
            .await
            .map_err(clear_error)
    }

    /// Number of entries currently stored. Unreadable directories count as
    /// empty rather than erroring, matching the degrade-gracefully policy.
    pub async fn size(&self) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let mut entries = match tokio::fs::read_dir(&self.config.dir).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                count += 1;
            }
        }
        count
    }
}
