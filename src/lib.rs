//! `casework-http` is a resilient async HTTP client for the casework backend.
//!
//! Every call runs under a timeout watchdog and a bounded retry policy with
//! exponential backoff and jitter. Responses can be cached per request with
//! one of three strategies:
//! - [`CacheStrategy::CacheFirst`]
//! - [`CacheStrategy::NetworkFirst`]
//! - [`CacheStrategy::StaleWhileRevalidate`]
//!
//! The entry point is [`HttpClient`]; [`execute_with_retry`] and
//! [`CacheStore`] are usable on their own.

mod cache;
mod client;
mod error;
mod options;
mod policy;
mod request;
mod retry;
mod strategy;

pub use cache::{CacheEntry, CacheStore};
pub use client::{HttpClient, READ_ONLY_CACHE_TTL};
pub use error::{FailSoft, RequestError};
pub use options::ClientOptions;
pub use policy::{RetryOverrides, RetryPolicy, TimeoutPolicy};
pub use request::{CacheOptions, Method, RequestBody, RequestSpec};
pub use retry::{backoff_delay, execute_with_retry, is_retryable};
pub use strategy::CacheStrategy;

pub type Result<T> = std::result::Result<T, RequestError>;
