//! On-disk cache layout: the versioned external contract.
//!
//! The cache directory follows the Scrapy-style filesystem layout so
//! external tooling can inspect and reuse it: one directory per request
//! fingerprint, containing
//!
//! ```text
//! <cache_dir>/<sha256-hex>/
//!     request_body        raw request body
//!     request_headers     JSON map of request headers
//!     response_body       raw response body (uncompressed entries)
//!     response_body.gz    gzip response body (compressed entries)
//!     response_headers    JSON map of response headers
//!     meta                JSON: timestamp, method, url, status_code, reason
//! ```
//!
//! Everything that knows the exact byte layout lives here; the store in the
//! parent module only moves [`EntryMeta`] values and opaque bodies around.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub(crate) const REQUEST_BODY_FILE: &str = "request_body";
pub(crate) const REQUEST_HEADERS_FILE: &str = "request_headers";
pub(crate) const RESPONSE_BODY_FILE: &str = "response_body";
pub(crate) const RESPONSE_BODY_GZ_FILE: &str = "response_body.gz";
pub(crate) const RESPONSE_HEADERS_FILE: &str = "response_headers";
pub(crate) const META_FILE: &str = "meta";

/// Content-addressed identity of a logical request.
///
/// Identical logical requests always produce the identical key; distinct
/// requests produce distinct keys with overwhelming probability (SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical fingerprint input. Field order is alphabetical and headers are
/// a sorted map, so the serialized form is stable across processes.
#[derive(Serialize)]
struct Fingerprint<'a> {
    body: String,
    headers: &'a BTreeMap<String, String>,
    method: String,
    url: &'a str,
}

/// Derive the cache key for a request.
///
/// Hashes the uppercased method, the final URL (query parameters already
/// merged), the sorted request headers, and the body bytes (hex-encoded so
/// binary bodies stay representable in the canonical JSON).
pub fn request_fingerprint(
    method: &str,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: &[u8],
) -> CacheKey {
    let fingerprint = Fingerprint {
        body: hex::encode(body),
        headers,
        method: method.to_ascii_uppercase(),
        url,
    };
    let canonical =
        serde_json::to_vec(&fingerprint).expect("fingerprint serialization is infallible");
    let digest = Sha256::digest(&canonical);
    CacheKey(hex::encode(digest))
}

/// Metadata record stored in each entry's `meta` file.
///
/// Field names are part of the external contract; do not rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryMeta {
    /// Stored-at time, seconds since the Unix epoch.
    pub timestamp: f64,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Gzip-compress a body for a `response_body.gz` file.
pub(crate) fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a `response_body.gz` file back to the raw body.
pub(crate) fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_headers() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let k1 = request_fingerprint("GET", "https://example.com/a", &no_headers(), b"");
        let k2 = request_fingerprint("GET", "https://example.com/a", &no_headers(), b"");
        assert_eq!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_on_method() {
        let k1 = request_fingerprint("GET", "https://example.com/a", &no_headers(), b"");
        let k2 = request_fingerprint("POST", "https://example.com/a", &no_headers(), b"");
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_on_url() {
        let k1 = request_fingerprint("GET", "https://example.com/a", &no_headers(), b"");
        let k2 = request_fingerprint("GET", "https://example.com/b", &no_headers(), b"");
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_on_body() {
        let k1 = request_fingerprint("POST", "https://example.com/a", &no_headers(), b"x=1");
        let k2 = request_fingerprint("POST", "https://example.com/a", &no_headers(), b"x=2");
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_ignores_method_case() {
        let k1 = request_fingerprint("get", "https://example.com/a", &no_headers(), b"");
        let k2 = request_fingerprint("GET", "https://example.com/a", &no_headers(), b"");
        assert_eq!(k1, k2);
    }

    #[test]
    fn fingerprint_ignores_header_insertion_order() {
        let mut h1 = BTreeMap::new();
        h1.insert("Accept".to_string(), "text/html".to_string());
        h1.insert("X-Token".to_string(), "abc".to_string());
        let mut h2 = BTreeMap::new();
        h2.insert("X-Token".to_string(), "abc".to_string());
        h2.insert("Accept".to_string(), "text/html".to_string());
        let k1 = request_fingerprint("GET", "https://example.com/a", &h1, b"");
        let k2 = request_fingerprint("GET", "https://example.com/a", &h2, b"");
        assert_eq!(k1, k2);
    }

    #[test]
    fn gzip_roundtrip() {
        let body = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let compressed = gzip(&body).unwrap();
        assert!(compressed.len() < body.len());
        assert_eq!(gunzip(&compressed).unwrap(), body);
    }

    #[test]
    fn meta_uses_external_field_names() {
        let meta = EntryMeta {
            timestamp: 1700000000.5,
            method: "GET".into(),
            url: "https://example.com".into(),
            status_code: 200,
            reason: Some("OK".into()),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert!(value.get("timestamp").is_some());
        assert!(value.get("status_code").is_some());
        assert!(value.get("reason").is_some());
    }
}
