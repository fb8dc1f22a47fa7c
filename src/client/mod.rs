//! Request orchestrator.
//!
//! [`Client`] composes the cache, proxy rotation, retry policy, and
//! transport into one logical-call pipeline: consult the cache, else select
//! a proxy, execute with retries, store the successful result. Per-call
//! options shadow construction defaults without mutating them.

mod builder;
mod options;

pub use builder::{Muninn, MuninnBuilder};
pub use options::RequestOptions;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{CacheKey, HttpCache, request_fingerprint};
use crate::proxy::ProxyRotation;
use crate::retry::{RetryConfig, RetryDecision};
use crate::telemetry;
use crate::transport::{Transport, TransportError, TransportRequest};
use crate::{MuninnError, Response, Result};

/// Status codes that trigger a retry by default: server errors plus the
/// Cloudflare 52x range.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 9] = [500, 502, 503, 504, 520, 521, 522, 523, 524];

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_USER_AGENT: &str = concat!("muninn/", env!("CARGO_PKG_VERSION"));

/// Resilient HTTP client: retries, response caching, proxy rotation.
///
/// Safe to share across tasks; the only mutable shared state is the proxy
/// rotation cursor and the retry-status set, each behind its own lock with
/// a read-or-advance-sized critical section.
pub struct Client {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: HttpCache,
    pub(crate) rotation: ProxyRotation,
    pub(crate) retry: RetryConfig,
    pub(crate) retry_status: Mutex<BTreeSet<u16>>,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: String,
    pub(crate) verify_ssl: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("verify_ssl", &self.verify_ssl)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Make a GET request.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, url, options).await
    }

    /// Make a POST request. Body or JSON payload go in `options`.
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, url, options).await
    }

    /// Make a request with retry, caching, and proxy selection.
    ///
    /// Any received response is a terminal success unless its status is in
    /// the retry set; callers branch on [`Response::status`] themselves.
    /// Each attempt gets a fresh timeout; there is no cross-attempt
    /// deadline, so a call with N retries can block for up to N+1 timeouts
    /// plus backoff.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let (target, headers, body) = self.prepare(&method, url, &options)?;
        let url_string = target.to_string();

        let timeout = options.timeout.unwrap_or(self.timeout);
        if timeout.is_zero() {
            return Err(MuninnError::invalid_argument(
                "timeout",
                "must be greater than zero",
            ));
        }
        let verify_ssl = options.verify_ssl.unwrap_or(self.verify_ssl);
        let max_retries = options.retry_count.unwrap_or(self.retry.max_retries);

        // CHECK_CACHE: GET/HEAD participate by default; a body-bearing
        // method only with an explicit per-call opt-in.
        let use_cache = options.use_cache.unwrap_or(self.cache.enabled()) && self.cache.enabled();
        let cacheable = use_cache
            && (method == Method::GET || method == Method::HEAD || options.use_cache == Some(true));
        let key = cacheable.then(|| {
            request_fingerprint(
                method.as_str(),
                &url_string,
                &headers,
                body.as_deref().unwrap_or_default(),
            )
        });

        if let Some(key) = &key {
            if let Some(response) = self.cache_lookup(key, &method, &url_string).await {
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "method" => method.to_string(), "status" => "ok")
                .increment(1);
                return Ok(response);
            }
        }

        // SELECT_PROXY: once per logical call; retries reuse the selection.
        // A per-call override bypasses the shared cursor entirely.
        let proxy = match &options.proxy {
            Some(proxy) => {
                proxy.validate()?;
                Some(proxy.clone())
            }
            None => {
                let selected = self.rotation.next();
                if selected.is_some() {
                    metrics::counter!(telemetry::PROXY_SELECTIONS_TOTAL).increment(1);
                }
                selected
            }
        };
        if let Some(proxy) = &proxy {
            if proxy.address_for(target.scheme()).is_none() {
                return Err(MuninnError::invalid_proxy(format!(
                    "no proxy address configured for scheme '{}'",
                    target.scheme()
                )));
            }
            debug!(scheme = target.scheme(), "using proxy");
        }

        info!(method = %method, url = %url_string, max_retries, "starting request");

        let request = TransportRequest {
            method: method.clone(),
            url: target,
            headers: headers.clone(),
            body: body.clone(),
            timeout,
            proxy,
            verify_ssl,
        };

        let mut last_status: Option<u16> = None;
        let mut attempt: u32 = 0;
        loop {
            match self.transport.execute(request.clone()).await {
                Ok(response) => {
                    let retryable = self
                        .retry_status
                        .lock()
                        .expect("retry status set poisoned")
                        .contains(&response.status);
                    if !retryable {
                        return Ok(self
                            .finish_success(response, &method, key.as_ref(), &headers, &body, attempt)
                            .await);
                    }
                    last_status = Some(response.status);
                    warn!(
                        status = response.status,
                        attempt = attempt + 1,
                        attempts = max_retries + 1,
                        "retryable status received"
                    );
                }
                Err(TransportError::Tls(message)) => {
                    error!(url = %url_string, error = %message, "SSL failure, not retrying");
                    metrics::counter!(telemetry::REQUESTS_TOTAL,
                        "method" => method.to_string(), "status" => "error")
                    .increment(1);
                    return Err(MuninnError::Ssl {
                        url: url_string,
                        message,
                    });
                }
                Err(TransportError::Proxy(message)) => {
                    metrics::counter!(telemetry::REQUESTS_TOTAL,
                        "method" => method.to_string(), "status" => "error")
                    .increment(1);
                    return Err(MuninnError::invalid_proxy(message));
                }
                Err(e) if e.is_transient() => {
                    // Connection-level failure: last observed status no
                    // longer describes the latest attempt.
                    last_status = None;
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        attempts = max_retries + 1,
                        "transient transport error"
                    );
                }
                Err(e) => {
                    error!(url = %url_string, error = %e, "non-retryable transport error");
                    metrics::counter!(telemetry::REQUESTS_TOTAL,
                        "method" => method.to_string(), "status" => "error")
                    .increment(1);
                    return Err(MuninnError::Transport {
                        url: url_string,
                        message: e.to_string(),
                    });
                }
            }

            match self.retry.decide(attempt, max_retries) {
                RetryDecision::RetryAfter(delay) => {
                    metrics::counter!(telemetry::RETRIES_TOTAL, "method" => method.to_string())
                        .increment(1);
                    info!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        last_status = ?last_status,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => break,
            }
        }

        error!(
            method = %method,
            url = %url_string,
            max_retries,
            last_status = ?last_status,
            "all retries exhausted"
        );
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "method" => method.to_string(), "status" => "error")
        .increment(1);
        Err(MuninnError::MaxRetriesExceeded {
            url: url_string,
            max_retries,
            last_status,
        })
    }

    /// Validate the call inputs and compute the effective URL, headers,
    /// and body.
    fn prepare(
        &self,
        method: &Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<(Url, BTreeMap<String, String>, Option<Vec<u8>>)> {
        if url.trim().is_empty() {
            return Err(MuninnError::invalid_argument(
                "url",
                "must be a non-empty string",
            ));
        }
        let mut target = Url::parse(url).map_err(|e| {
            MuninnError::invalid_argument("url", format!("failed to parse '{url}': {e}"))
        })?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(MuninnError::invalid_argument(
                "url",
                format!("unsupported scheme '{}'", target.scheme()),
            ));
        }
        if !options.params.is_empty() {
            target.query_pairs_mut().extend_pairs(options.params.iter());
        }

        let mut headers = options.headers.clone();
        let body = match (&options.body, &options.json) {
            (Some(_), Some(_)) => {
                return Err(MuninnError::invalid_argument(
                    "body",
                    "body and json payloads are mutually exclusive",
                ));
            }
            (Some(body), None) => Some(body.clone()),
            (None, Some(payload)) => {
                if !has_header(&headers, "content-type") {
                    headers.insert("Content-Type".into(), "application/json".into());
                }
                Some(serde_json::to_vec(payload)?)
            }
            (None, None) => None,
        };
        if body.is_some() && *method == Method::GET {
            return Err(MuninnError::invalid_argument(
                "body",
                "GET requests cannot carry a body",
            ));
        }
        if !has_header(&headers, "user-agent") {
            headers.insert("User-Agent".into(), self.user_agent.clone());
        }

        Ok((target, headers, body))
    }

    /// CHECK_CACHE: a hit short-circuits the call; read failures are
    /// absorbed as misses and emitted as cache-error events.
    async fn cache_lookup(
        &self,
        key: &CacheKey,
        method: &Method,
        url: &str,
    ) -> Option<Response> {
        match self.cache.get(key).await {
            Ok(Some(response)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "method" => method.to_string())
                    .increment(1);
                info!(method = %method, url, key = %key, "cache hit");
                Some(response)
            }
            Ok(None) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "method" => method.to_string())
                    .increment(1);
                debug!(method = %method, url, "cache miss");
                None
            }
            Err(e) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "read")
                    .increment(1);
                warn!(method = %method, url, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// SUCCESS → STORE_CACHE → DONE. Store failures never alter the
    /// returned result.
    async fn finish_success(
        &self,
        response: Response,
        method: &Method,
        key: Option<&CacheKey>,
        request_headers: &BTreeMap<String, String>,
        request_body: &Option<Vec<u8>>,
        attempt: u32,
    ) -> Response {
        if attempt > 0 {
            info!(retries = attempt, "request succeeded after retries");
        }
        info!(
            method = %method,
            status = response.status,
            bytes = response.content_length(),
            "request completed"
        );
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "method" => method.to_string(), "status" => "ok")
        .increment(1);

        if let Some(key) = key {
            if response.status < 400 {
                match self
                    .cache
                    .store(
                        key,
                        method.as_str(),
                        request_headers,
                        request_body.as_deref().unwrap_or_default(),
                        &response,
                    )
                    .await
                {
                    Ok(()) => {
                        metrics::counter!(telemetry::CACHE_STORES_TOTAL,
                            "method" => method.to_string())
                        .increment(1);
                    }
                    Err(e) => {
                        metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "write")
                            .increment(1);
                        warn!(error = %e, "failed to store response in cache");
                    }
                }
            }
        }
        response
    }

    /// Add a status code to the retry set. Safe to call concurrently with
    /// in-flight requests.
    pub fn add_retry_status_code(&self, code: u16) -> Result<()> {
        if !(100..=599).contains(&code) {
            return Err(MuninnError::invalid_argument(
                "status_code",
                format!("{code} is not a valid HTTP status code (100-599)"),
            ));
        }
        self.retry_status
            .lock()
            .expect("retry status set poisoned")
            .insert(code);
        info!(code, "added retry status code");
        Ok(())
    }

    /// Remove a status code from the retry set.
    pub fn remove_retry_status_code(&self, code: u16) {
        self.retry_status
            .lock()
            .expect("retry status set poisoned")
            .remove(&code);
        info!(code, "removed retry status code");
    }

    /// Current retry status codes, sorted ascending.
    pub fn retry_status_codes(&self) -> Vec<u16> {
        self.retry_status
            .lock()
            .expect("retry status set poisoned")
            .iter()
            .copied()
            .collect()
    }

    /// Number of entries currently in the cache.
    pub async fn cache_size(&self) -> usize {
        self.cache.size().await
    }

    /// Remove all cached entries.
    pub async fn clear_cache(&self) -> Result<()> {
        let removed = self.cache.size().await;
        self.cache.clear().await?;
        info!(removed, "cache cleared");
        Ok(())
    }

    /// Release held transport resources (pooled connections).
    pub fn close(&self) {
        self.transport.shutdown();
        info!("transport resources released");
    }
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}
