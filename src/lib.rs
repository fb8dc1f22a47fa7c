//! Muninn - resilient HTTP client with retries, caching, and proxy rotation
//!
//! This crate layers three cross-cutting behaviours over raw HTTP
//! transport: automatic retry with exponential backoff for transient
//! failures, transparent on-disk response caching keyed on request
//! identity (Scrapy-compatible layout), and round-robin proxy rotation
//! across outbound requests.
//!
//! # Example
//!
//! ```rust,no_run
//! use muninn::{Muninn, RequestOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let client = Muninn::builder()
//!         .retry_count(3)
//!         .cache_enabled(true)
//!         .cache_dir("httpcache")
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let response = client
//!         .get("https://httpbin.org/get", RequestOptions::new())
//!         .await?;
//!
//!     println!("{} ({} bytes)", response.status, response.content_length());
//!     Ok(())
//! }
//! ```
//!
//! # Per-call overrides
//!
//! ```rust,no_run
//! # use muninn::{Muninn, RequestOptions, ProxyConfig};
//! # use std::time::Duration;
//! # #[tokio::main]
//! # async fn main() -> muninn::Result<()> {
//! # let client = Muninn::builder().build()?;
//! let response = client
//!     .post(
//!         "https://api.example.com/submit",
//!         RequestOptions::new()
//!             .json(serde_json::json!({"name": "value"}))
//!             .retry_count(1)
//!             .proxy(ProxyConfig::all("http://proxy.internal:3128"))
//!             .timeout(Duration::from_secs(5)),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod proxy;
pub mod response;
pub mod retry;
pub mod telemetry;
pub mod transport;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheKey, HttpCache, request_fingerprint};
pub use client::{Client, DEFAULT_RETRY_STATUS_CODES, Muninn, MuninnBuilder, RequestOptions};
pub use error::{CacheError, MuninnError, Result};
pub use proxy::{ProxyConfig, ProxyRotation};
pub use response::Response;
pub use retry::{RetryConfig, RetryDecision};
pub use transport::{Transport, TransportError, TransportRequest};

// HTTP method type used by `Client::request`.
pub use reqwest::Method;
