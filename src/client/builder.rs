//! Builder for configuring client instances

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{CacheConfig, HttpCache};
use crate::proxy::{ProxyConfig, ProxyRotation};
use crate::retry::RetryConfig;
use crate::transport::{ReqwestTransport, Transport};
use crate::{MuninnError, Result};

use super::{Client, DEFAULT_RETRY_STATUS_CODES, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

/// Main entry point for creating client instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the client.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring client instances.
pub struct MuninnBuilder {
    retry: RetryConfig,
    retry_status_codes: Option<BTreeSet<u16>>,
    proxies: Vec<ProxyConfig>,
    cache: CacheConfig,
    timeout: Duration,
    user_agent: Option<String>,
    verify_ssl: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            retry_status_codes: None,
            proxies: Vec::new(),
            cache: CacheConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            verify_ssl: true,
            transport: None,
        }
    }

    /// Set the default retry budget (retries after the initial attempt).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry.max_retries = n;
        self
    }

    /// Replace the full retry configuration (backoff, jitter, budget).
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Replace the retry-triggering status code set.
    ///
    /// Default: {500, 502, 503, 504, 520–524}.
    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Add a proxy to the rotation list.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxies.push(proxy);
        self
    }

    /// Replace the rotation list.
    pub fn proxies(mut self, proxies: impl IntoIterator<Item = ProxyConfig>) -> Self {
        self.proxies = proxies.into_iter().collect();
        self
    }

    /// Replace the full cache configuration.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Enable or disable response caching.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    /// Set the cache directory. Default: `httpcache`.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = dir.into();
        self
    }

    /// Gzip-compress cached response bodies.
    pub fn cache_compress(mut self, compress: bool) -> Self {
        self.cache.compress = compress;
        self
    }

    /// Expire cached entries after this duration. Default: unbounded.
    pub fn cache_expiry(mut self, ttl: Duration) -> Self {
        self.cache.expiry = Some(ttl);
        self
    }

    /// Set the default per-attempt timeout. Default: 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enable or disable TLS certificate verification. Default: enabled.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Substitute the transport implementation (for tests).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client, validating construction inputs.
    pub fn build(self) -> Result<Client> {
        if self.timeout.is_zero() {
            return Err(MuninnError::invalid_argument(
                "timeout",
                "must be greater than zero",
            ));
        }

        let retry_status = self
            .retry_status_codes
            .unwrap_or_else(|| DEFAULT_RETRY_STATUS_CODES.into_iter().collect());
        if let Some(code) = retry_status.iter().find(|c| !(100..=599).contains(*c)) {
            return Err(MuninnError::invalid_argument(
                "retry_status_codes",
                format!("{code} is not a valid HTTP status code (100-599)"),
            ));
        }

        for proxy in &self.proxies {
            proxy.validate()?;
        }

        let cache = HttpCache::new(self.cache)?;

        Ok(Client {
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
            cache,
            rotation: ProxyRotation::new(self.proxies),
            retry: self.retry,
            retry_status: Mutex::new(retry_status),
            timeout: self.timeout,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            verify_ssl: self.verify_ssl,
        })
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
