//! Response value returned to callers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::{MuninnError, Result};

/// Terminal result of a logical call: status, headers, body, and a marker
/// for cache origin vs live fetch.
///
/// Any received status is a terminal success unless it is in the retry set;
/// callers inspect [`status`](Self::status) themselves (a 404 is a
/// response, not an error).
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL of the request.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase, when known.
    pub reason: Option<String>,
    /// Response headers. Sorted map so snapshots are deterministic.
    /// Repeated headers (e.g. `Set-Cookie`) collapse to their last value.
    pub headers: BTreeMap<String, String>,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Whether this response was served from the cache rather than fetched
    /// live.
    pub from_cache: bool,
}

impl Response {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(MuninnError::Json)
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body size in bytes.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}
