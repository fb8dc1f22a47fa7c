//! Transport abstraction and the reqwest-backed production implementation.
//!
//! [`Transport`] is the seam between the orchestrator and the wire: one
//! call to [`execute`](Transport::execute) performs exactly one connection
//! attempt and classifies its failure mode. Tests substitute mock
//! transports to drive the retry, proxy, and cache paths without sockets.
//!
//! reqwest fixes proxy and TLS-verification settings per client, so
//! [`ReqwestTransport`] keeps a small pool of clients keyed by
//! (proxy, verify) and reuses them across attempts. [`shutdown`] drops the
//! pool, releasing connection resources on every exit path.
//!
//! [`shutdown`]: Transport::shutdown

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::Response;
use crate::proxy::ProxyConfig;

/// Everything one connection attempt needs, resolved from the effective
/// per-call configuration.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: reqwest::Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub proxy: Option<ProxyConfig>,
    pub verify_ssl: bool,
}

/// Connection-level failure classification.
///
/// The orchestrator maps these onto the error taxonomy: `Timeout` and
/// `Connect` are transient (retryable), `Tls` surfaces immediately as an
/// SSL failure, `Proxy` as a proxy-configuration failure, and `Other`
/// propagates as a generic transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("proxy setup failed: {0}")]
    Proxy(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether retrying can plausibly fix this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

/// One-attempt HTTP transport collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one transport operation.
    async fn execute(&self, request: TransportRequest) -> Result<Response, TransportError>;

    /// Release held connection resources. Default: no-op.
    fn shutdown(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
    verify_ssl: bool,
}

/// Production transport backed by pooled `reqwest` clients.
pub struct ReqwestTransport {
    clients: Mutex<HashMap<PoolKey, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(
        &self,
        proxy: Option<&ProxyConfig>,
        verify_ssl: bool,
    ) -> Result<reqwest::Client, TransportError> {
        let key = PoolKey {
            http_proxy: proxy.and_then(|p| p.http.clone()),
            https_proxy: proxy.and_then(|p| p.https.clone()),
            verify_ssl,
        };

        let mut clients = self.clients.lock().expect("transport pool poisoned");
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder();
        if !verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(address) = &key.http_proxy {
            let proxy = reqwest::Proxy::http(address)
                .map_err(|e| TransportError::Proxy(format!("http proxy '{address}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        if let Some(address) = &key.https_proxy {
            let proxy = reqwest::Proxy::https(address)
                .map_err(|e| TransportError::Proxy(format!("https proxy '{address}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let client = self.client_for(request.proxy.as_ref(), request.verify_ssl)?;

        let mut builder = client
            .request(request.method, request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?;

        Ok(Response {
            url,
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_owned),
            headers,
            body: body.to_vec(),
            from_cache: false,
        })
    }

    fn shutdown(&self) {
        self.clients.lock().expect("transport pool poisoned").clear();
    }
}

/// Classify a reqwest error into a [`TransportError`].
///
/// reqwest reports certificate rejections as connect errors and exposes no
/// TLS predicate, so the source chain is scanned for certificate wording.
/// Timeouts are ruled out first (a slow handshake stays retryable), and
/// the match terms are limited to certificate problems so a connection
/// reset mid-handshake still classifies as `Connect`.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if chain_mentions_certificate(&err) {
        TransportError::Tls(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

fn chain_mentions_certificate(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let message = e.to_string().to_ascii_lowercase();
        if message.contains("certificate")
            || message.contains("unknown issuer")
            || message.contains("self signed")
            || message.contains("self-signed")
        {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ChainedError {
        message: &'static str,
        source: Option<Box<ChainedError>>,
    }

    impl std::fmt::Display for ChainedError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for ChainedError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source
                .as_deref()
                .map(|e| e as &(dyn std::error::Error + 'static))
        }
    }

    fn chain(messages: &[&'static str]) -> ChainedError {
        let mut error: Option<Box<ChainedError>> = None;
        for &message in messages.iter().rev() {
            error = Some(Box::new(ChainedError {
                message,
                source: error,
            }));
        }
        *error.expect("at least one message")
    }

    #[test]
    fn certificate_rejection_is_detected_deep_in_the_chain() {
        let err = chain(&[
            "error sending request",
            "client error (Connect)",
            "invalid peer certificate: UnknownIssuer",
        ]);
        assert!(chain_mentions_certificate(&err));
    }

    #[test]
    fn handshake_reset_is_not_a_certificate_failure() {
        let err = chain(&[
            "error sending request",
            "client error (Connect)",
            "connection reset during tls handshake",
        ]);
        assert!(!chain_mentions_certificate(&err));
    }

    #[test]
    fn plain_connection_refused_is_not_a_certificate_failure() {
        let err = chain(&["error sending request", "connection refused"]);
        assert!(!chain_mentions_certificate(&err));
    }
}
