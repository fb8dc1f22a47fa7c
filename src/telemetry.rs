//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `method`: HTTP method of the logical call ("GET", "POST")
//! - `status`: terminal outcome, "ok" or "error"

/// Total logical calls that reached a terminal outcome.
///
/// Labels: `method`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Total retry attempts (not counting the initial attempt of each call).
///
/// Labels: `method`.
pub const RETRIES_TOTAL: &str = "muninn_retries_total";

/// Total cache hits.
///
/// Labels: `method`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses (includes lookups against expired entries).
///
/// Labels: `method`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total responses written to the cache.
///
/// Labels: `method`.
pub const CACHE_STORES_TOTAL: &str = "muninn_cache_stores_total";

/// Total cache read/write failures absorbed as misses or skipped stores.
///
/// Labels: `operation` ("read" | "write").
pub const CACHE_ERRORS_TOTAL: &str = "muninn_cache_errors_total";

/// Total proxy selections from the shared rotation (overrides excluded).
pub const PROXY_SELECTIONS_TOTAL: &str = "muninn_proxy_selections_total";
