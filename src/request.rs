use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

pub use reqwest::Method;

use crate::{CacheStrategy, RequestError, Result, RetryOverrides, TimeoutPolicy};

/// Request payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// Serialized as JSON text.
    Json(serde_json::Value),
    /// Sent as-is, e.g. file contents.
    Bytes(Vec<u8>),
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Per-request cache settings. Caching is enabled when present on a spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub strategy: CacheStrategy,
}

impl CacheOptions {
    pub fn new(ttl: Duration, strategy: CacheStrategy) -> Self {
        Self { ttl, strategy }
    }

    /// Rejects a zero TTL; cached entries must stay fresh for some time.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(RequestError::InvalidPolicy(
                "cache ttl must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Full description of one logical call.
///
/// `timeout` and `retry` fall back to the client defaults when unset.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    /// Path appended to the client base URL.
    pub target: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Option<TimeoutPolicy>,
    pub retry: Option<RetryOverrides>,
    pub cache: Option<CacheOptions>,
}

impl RequestSpec {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            retry: None,
            cache: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Bytes(bytes));
        self
    }

    pub fn timeout(mut self, timeout: TimeoutPolicy) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: impl Into<RetryOverrides>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn cache(mut self, ttl: Duration, strategy: CacheStrategy) -> Self {
        self.cache = Some(CacheOptions::new(ttl, strategy));
        self
    }

    /// Cache key for this request: `METHOD:target:fingerprint`.
    ///
    /// The fingerprint is the JSON body when there is one, otherwise the
    /// caller headers.
    pub fn cache_key(&self) -> String {
        self.scoped_cache_key("", None)
    }

    /// Cache key for this request as sent to `base_url`, with a hash of
    /// `credential` appended when one is present.
    ///
    /// Clients sharing a [`CacheStore`](crate::CacheStore) use this so that
    /// different hosts or credentials never see each other's responses.
    pub fn scoped_cache_key(&self, base_url: &str, credential: Option<&str>) -> String {
        let fingerprint = match &self.body {
            Some(RequestBody::Json(value)) => value.to_string(),
            Some(RequestBody::Bytes(bytes)) => {
                format!("bytes:{}:{:016x}", bytes.len(), hash_bytes(bytes))
            }
            None => serde_json::to_string(&self.headers).unwrap_or_default(),
        };
        let mut key = format!("{}:{}{}:{}", self.method, base_url, self.target, fingerprint);
        if let Some(credential) = credential {
            key.push_str(&format!(":cred:{:016x}", hash_bytes(credential.as_bytes())));
        }
        key
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{CacheOptions, Method, RequestBody, RequestSpec};
    use crate::{CacheStrategy, RequestError, RetryPolicy};

    #[test]
    fn cache_key_uses_headers_without_body() {
        let spec = RequestSpec::get("/cases").header("x-workspace", "workspace-1");
        assert_eq!(spec.cache_key(), r#"GET:/cases:{"x-workspace":"workspace-1"}"#);
    }

    #[test]
    fn cache_key_prefers_body() {
        let spec = RequestSpec::post("/cases/search")
            .header("x-workspace", "workspace-1")
            .json(json!({"status": "open"}));
        assert_eq!(spec.cache_key(), r#"POST:/cases/search:{"status":"open"}"#);
    }

    #[test]
    fn cache_key_distinguishes_method_and_body() {
        let a = RequestSpec::new(Method::PUT, "/cases/1").json(json!({"n": 1}));
        let b = RequestSpec::new(Method::PUT, "/cases/1").json(json!({"n": 2}));
        let c = RequestSpec::new(Method::POST, "/cases/1").json(json!({"n": 1}));
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());

        let bytes = RequestSpec::post("/files").bytes(vec![1, 2, 3]);
        assert!(bytes.cache_key().starts_with("POST:/files:bytes:3:"));
    }

    #[test]
    fn builder_sets_optional_fields() {
        let spec = RequestSpec::get("/templates")
            .retry(RetryPolicy::READ_ONLY)
            .cache(Duration::from_secs(30), CacheStrategy::NetworkFirst);

        assert_eq!(spec.retry.and_then(|r| r.max_retries), Some(1));
        let cache = spec.cache.expect("cache options must be set");
        assert_eq!(cache.strategy, CacheStrategy::NetworkFirst);
        assert!(spec.body.is_none());
        assert!(matches!(
            RequestBody::from(json!(null)),
            RequestBody::Json(serde_json::Value::Null)
        ));
    }

    #[test]
    fn scoped_cache_key_separates_hosts_and_credentials() {
        let spec = RequestSpec::get("/cases");
        let tenant_a = spec.scoped_cache_key("https://a.example.com", Some("Bearer token-a"));
        let tenant_b = spec.scoped_cache_key("https://b.example.com", Some("Bearer token-a"));
        let other_token = spec.scoped_cache_key("https://a.example.com", Some("Bearer token-b"));

        assert!(tenant_a.starts_with("GET:https://a.example.com/cases:{}:cred:"));
        assert!(!tenant_a.contains("token-a"));
        assert_ne!(tenant_a, tenant_b);
        assert_ne!(tenant_a, other_token);
        assert_eq!(
            spec.scoped_cache_key("https://a.example.com", None),
            "GET:https://a.example.com/cases:{}"
        );
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let zero = CacheOptions::new(Duration::ZERO, CacheStrategy::CacheFirst);
        assert!(matches!(zero.validate(), Err(RequestError::InvalidPolicy(_))));
        let minute = CacheOptions::new(Duration::from_secs(60), CacheStrategy::CacheFirst);
        assert!(minute.validate().is_ok());
    }
}
