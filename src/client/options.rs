//! Per-call request options.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::proxy::ProxyConfig;

/// Per-call overrides layered over the client's construction defaults.
///
/// Every field shadows the corresponding default for the duration of one
/// logical call only; global defaults are never mutated. Unset fields fall
/// through to the client configuration.
///
/// ```rust
/// # use muninn::RequestOptions;
/// # use std::time::Duration;
/// let options = RequestOptions::new()
///     .param("page", "2")
///     .header("Accept", "application/json")
///     .retry_count(1)
///     .timeout(Duration::from_secs(5))
///     .use_cache(false);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) params: BTreeMap<String, String>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) retry_count: Option<u32>,
    pub(crate) proxy: Option<ProxyConfig>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) verify_ssl: Option<bool>,
    pub(crate) use_cache: Option<bool>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) json: Option<serde_json::Value>,
}

impl RequestOptions {
    /// Create empty options (all defaults apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query parameter to the request URL.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Override the retry budget for this call.
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = Some(n);
        self
    }

    /// Use a specific proxy for this call, bypassing the shared rotation
    /// (the rotation cursor does not advance).
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Override the per-attempt timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override TLS certificate verification for this call.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = Some(verify);
        self
    }

    /// Override cache participation for this call.
    ///
    /// `false` skips both the cache read and the cache write even when
    /// caching is globally enabled. `true` additionally opts a POST into
    /// caching, which is otherwise reserved for GET/HEAD.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Set a raw request body. Mutually exclusive with
    /// [`json()`](Self::json).
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON payload. Mutually exclusive with [`body()`](Self::body);
    /// implies a `Content-Type: application/json` header unless one is set
    /// explicitly.
    pub fn json(mut self, payload: serde_json::Value) -> Self {
        self.json = Some(payload);
        self
    }
}
