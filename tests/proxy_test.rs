//! Proxy rotation tests driven through a recording mock transport.
//!
//! The mock captures the proxy each attempt was dispatched with, so
//! rotation order and per-call overrides can be asserted without sockets.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use muninn::{
    Muninn, MuninnError, ProxyConfig, RequestOptions, Response, Transport, TransportError,
    TransportRequest,
};

/// Records every request and answers 200.
struct RecordingTransport {
    requests: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
        })
    }

    fn proxies_seen(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.proxy.as_ref().and_then(|p| p.http.clone()))
            .collect()
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let url = request.url.to_string();
        self.requests.lock().unwrap().push(request);
        Ok(Response {
            url,
            status: 200,
            reason: Some("OK".to_string()),
            headers: Default::default(),
            body: Vec::new(),
            from_cache: false,
        })
    }
}

/// Fails every attempt with a TLS classification.
struct TlsFailingTransport {
    calls: Mutex<usize>,
}

#[async_trait]
impl Transport for TlsFailingTransport {
    async fn execute(&self, _request: TransportRequest) -> Result<Response, TransportError> {
        *self.calls.lock().unwrap() += 1;
        Err(TransportError::Tls(
            "invalid peer certificate".to_string(),
        ))
    }
}

fn proxy(address: &str) -> ProxyConfig {
    ProxyConfig::all(address)
}

#[tokio::test]
async fn proxies_rotate_in_round_robin_order() {
    let transport = RecordingTransport::new();
    let client = Muninn::builder()
        .proxies([
            proxy("http://proxy-a:8080"),
            proxy("http://proxy-b:8080"),
            proxy("http://proxy-c:8080"),
        ])
        .transport(transport.clone())
        .build()
        .unwrap();

    for _ in 0..6 {
        client
            .get("https://example.com/", RequestOptions::new())
            .await
            .unwrap();
    }

    let seen = transport.proxies_seen();
    let expected: Vec<Option<String>> = [
        "http://proxy-a:8080",
        "http://proxy-b:8080",
        "http://proxy-c:8080",
        "http://proxy-a:8080",
        "http://proxy-b:8080",
        "http://proxy-c:8080",
    ]
    .iter()
    .map(|s| Some(s.to_string()))
    .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn per_call_proxy_does_not_advance_rotation() {
    let transport = RecordingTransport::new();
    let client = Muninn::builder()
        .proxies([proxy("http://proxy-a:8080"), proxy("http://proxy-b:8080")])
        .transport(transport.clone())
        .build()
        .unwrap();

    client
        .get("https://example.com/", RequestOptions::new())
        .await
        .unwrap();
    client
        .get(
            "https://example.com/",
            RequestOptions::new().proxy(proxy("http://override:3128")),
        )
        .await
        .unwrap();
    client
        .get("https://example.com/", RequestOptions::new())
        .await
        .unwrap();

    let seen = transport.proxies_seen();
    assert_eq!(
        seen,
        vec![
            Some("http://proxy-a:8080".to_string()),
            Some("http://override:3128".to_string()),
            // The override did not consume proxy-b.
            Some("http://proxy-b:8080".to_string()),
        ]
    );
}

#[tokio::test]
async fn no_proxies_means_direct_connections() {
    let transport = RecordingTransport::new();
    let client = Muninn::builder()
        .transport(transport.clone())
        .build()
        .unwrap();

    client
        .get("https://example.com/", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(transport.proxies_seen(), vec![None]);
}

#[tokio::test]
async fn builder_rejects_malformed_proxy() {
    let err = Muninn::builder()
        .proxy(ProxyConfig::new().http("not a url"))
        .build()
        .unwrap_err();
    assert!(matches!(err, MuninnError::InvalidProxy { .. }));

    let err = Muninn::builder()
        .proxy(ProxyConfig::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, MuninnError::InvalidProxy { .. }));
}

#[tokio::test]
async fn proxy_missing_request_scheme_fails_before_dispatch() {
    let transport = RecordingTransport::new();
    let client = Muninn::builder()
        .transport(transport.clone())
        .build()
        .unwrap();

    // https request against a proxy that only covers http.
    let err = client
        .get(
            "https://example.com/",
            RequestOptions::new().proxy(ProxyConfig::new().http("http://proxy-a:8080")),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MuninnError::InvalidProxy { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn tls_failures_are_never_retried() {
    let transport = Arc::new(TlsFailingTransport {
        calls: Mutex::new(0),
    });
    let client = Muninn::builder()
        .retry_count(5)
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client
        .get("https://self-signed.example.com/", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MuninnError::Ssl { .. }));
    assert_eq!(*transport.calls.lock().unwrap(), 1);
}
