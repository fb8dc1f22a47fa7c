//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    /// A method, URL, or option combination was rejected before any
    /// network attempt was made. Never retried.
    #[error("invalid argument '{argument}': {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    /// A proxy configuration was malformed or missing an address for the
    /// request URL's scheme. Raised before any network attempt.
    #[error("invalid proxy configuration: {reason}")]
    InvalidProxy { reason: String },

    /// Certificate or TLS handshake failure. Surfaced after the first
    /// occurrence; retrying cannot fix it.
    #[error("SSL error while requesting {url}: {message}")]
    Ssl { url: String, message: String },

    /// Retryable failures exhausted the configured attempt budget.
    ///
    /// `last_status` is `None` when the final failure was connection-level
    /// rather than an HTTP status in the retry set.
    #[error(
        "maximum retries ({max_retries}) exceeded for {url} (last status: {})",
        .last_status.map_or_else(|| "none".to_string(), |s| s.to_string())
    )]
    MaxRetriesExceeded {
        url: String,
        max_retries: u32,
        last_status: Option<u16>,
    },

    /// Cache store failure. Only surfaced from construction and explicit
    /// cache administration; during a call it is absorbed as a miss.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Non-TLS, non-retryable transport failure.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MuninnError {
    pub(crate) fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        MuninnError::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_proxy(reason: impl Into<String>) -> Self {
        MuninnError::InvalidProxy {
            reason: reason.into(),
        }
    }

    /// Short stable label for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            MuninnError::InvalidArgument { .. } => "invalid_argument",
            MuninnError::InvalidProxy { .. } => "invalid_proxy",
            MuninnError::Ssl { .. } => "ssl",
            MuninnError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            MuninnError::Cache(_) => "cache",
            MuninnError::Transport { .. } => "transport",
            MuninnError::Json(_) => "json",
        }
    }
}

/// Failure inside the cache store.
///
/// Carries the failed operation ("read", "write", "clear", ...) and the
/// cache directory involved. The orchestrator never fails a call on one of
/// these; it logs a cache-error event and proceeds as a miss.
#[derive(Debug, thiserror::Error)]
#[error("cache {operation} operation failed: {reason} (cache dir: {cache_dir})")]
pub struct CacheError {
    pub operation: &'static str,
    pub reason: String,
    pub cache_dir: String,
}

impl CacheError {
    pub(crate) fn new(
        operation: &'static str,
        reason: impl Into<String>,
        cache_dir: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            reason: reason.into(),
            cache_dir: cache_dir.into(),
        }
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
