//! Proxy configuration and round-robin rotation.
//!
//! A [`ProxyConfig`] maps URL schemes to proxy addresses, mirroring the
//! `{"http": ..., "https": ...}` shape most HTTP tooling consumes.
//! [`ProxyRotation`] owns the configured list and a shared cursor: every
//! default-configuration call draws the next proxy in list order, wrapping
//! modulo the list length. A per-call override bypasses the rotation and
//! leaves the cursor untouched.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{MuninnError, Result};

/// Scheme → proxy address mapping for a single upstream proxy.
///
/// Immutable once added to a rotation list. A config used for a request
/// must supply an address for the scheme of that request's URL; otherwise
/// the call is rejected with [`MuninnError::InvalidProxy`] before any
/// network attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy address for plain-HTTP targets, e.g. `http://proxy:8080`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// Proxy address for HTTPS targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Create an empty config. Populate with [`http()`](Self::http),
    /// [`https()`](Self::https), or [`all()`](Self::all).
    pub fn new() -> Self {
        Self {
            http: None,
            https: None,
        }
    }

    /// Set the proxy address for HTTP targets.
    pub fn http(mut self, address: impl Into<String>) -> Self {
        self.http = Some(address.into());
        self
    }

    /// Set the proxy address for HTTPS targets.
    pub fn https(mut self, address: impl Into<String>) -> Self {
        self.https = Some(address.into());
        self
    }

    /// Set the same proxy address for both schemes.
    pub fn all(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            http: Some(address.clone()),
            https: Some(address),
        }
    }

    /// The configured address for a target URL scheme, if any.
    pub fn address_for(&self, scheme: &str) -> Option<&str> {
        match scheme {
            "http" => self.http.as_deref(),
            "https" => self.https.as_deref(),
            _ => None,
        }
    }

    /// Validate that every configured address parses as an absolute URL
    /// with a host, and that at least one scheme is covered.
    pub fn validate(&self) -> Result<()> {
        if self.http.is_none() && self.https.is_none() {
            return Err(MuninnError::invalid_proxy(
                "proxy config supplies no address for any scheme",
            ));
        }
        for address in [self.http.as_deref(), self.https.as_deref()]
            .into_iter()
            .flatten()
        {
            let parsed = Url::parse(address).map_err(|e| {
                MuninnError::invalid_proxy(format!("failed to parse proxy URL '{address}': {e}"))
            })?;
            if parsed.host_str().is_none() {
                return Err(MuninnError::invalid_proxy(format!(
                    "proxy URL '{address}' has no host"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared round-robin proxy selector.
///
/// The cursor is process-wide per rotation instance (one per [`Client`]).
/// The critical section is a single read-and-advance of the cursor, cheap
/// enough not to serialise unrelated requests.
///
/// [`Client`]: crate::Client
pub struct ProxyRotation {
    proxies: Vec<ProxyConfig>,
    cursor: Mutex<usize>,
}

impl ProxyRotation {
    /// Create a rotation over a validated proxy list.
    pub fn new(proxies: Vec<ProxyConfig>) -> Self {
        Self {
            proxies,
            cursor: Mutex::new(0),
        }
    }

    /// Next proxy in cycle order, advancing the shared cursor.
    ///
    /// Returns `None` when no proxies are configured, meaning the caller
    /// performs the transport operation without a proxy.
    pub fn next(&self) -> Option<ProxyConfig> {
        if self.proxies.is_empty() {
            return None;
        }
        let mut cursor = self.cursor.lock().expect("proxy cursor poisoned");
        let proxy = self.proxies[*cursor].clone();
        *cursor = (*cursor + 1) % self.proxies.len();
        Some(proxy)
    }

    /// Number of proxies in the rotation.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether the rotation has no proxies configured.
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
