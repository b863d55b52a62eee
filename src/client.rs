use std::fmt;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::{
    execute_with_retry, CacheOptions, CacheStore, CacheStrategy, ClientOptions, Method,
    RequestBody, RequestError, RequestSpec, Result, RetryPolicy, TimeoutPolicy,
};

/// Default freshness window for [`HttpClient::read_only`] requests.
pub const READ_ONLY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
/// HTTP client with timeout watchdog, retry backoff and response caching.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    authorization: Option<String>,
    options: ClientOptions,
    cache: CacheStore,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Raw outcome of one network call, before status handling.
struct RawResponse {
    status: u16,
    body: String,
}

impl HttpClient {
    /// Creates a client whose requests target `base_url + target`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            authorization: None,
            options: ClientOptions::default(),
            cache: CacheStore::new(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `CASEWORK_API_BASE_URL`: API root, e.g. `https://api.example.com/v1`
    /// - `CASEWORK_API_TOKEN`: optional access token (Bearer prefix optional)
    ///
    /// Returns an error if the base URL is missing or empty.
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("CASEWORK_API_BASE_URL")
            .map_err(|_| "missing CASEWORK_API_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("CASEWORK_API_BASE_URL is set but empty".to_owned());
        }

        let client = Self::new(base_url.trim());
        match std::env::var("CASEWORK_API_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Ok(client.with_bearer(token)),
            _ => Ok(client),
        }
    }

    /// Applies default timeout and retry policies.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Uses `cache` instead of a private store, so several clients can share
    /// cached responses.
    ///
    /// Keys include the base URL and a hash of the authorization value, so
    /// clients for different hosts or credentials never read each other's
    /// entries.
    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    /// Sends `Authorization: Bearer <token>` on every request.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn with_bearer(mut self, token: impl AsRef<str>) -> Self {
        self.authorization = Some(normalize_bearer_authorization(token.as_ref()));
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Key under which this client caches the response to `spec`.
    pub fn cache_key(&self, spec: &RequestSpec) -> String {
        spec.scoped_cache_key(&self.base_url, self.authorization.as_deref())
    }

    /// Executes `spec` and decodes the JSON response into `T`.
    pub async fn request<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T> {
        let value = self.request_value(spec).await?;
        serde_json::from_value(value)
            .map_err(|err| RequestError::Decode(format!("unexpected response shape: {err}")))
    }

    /// Executes `spec` and returns the undecoded JSON response.
    pub async fn request_value(&self, spec: RequestSpec) -> Result<JsonValue> {
        let retry = match &spec.retry {
            Some(overrides) => self.options.retry.merged(overrides)?,
            None => self.options.retry.clone(),
        };
        let timeout = spec.timeout.unwrap_or(self.options.timeout);

        let Some(cache) = spec.cache else {
            return self.execute(spec, timeout, retry).await;
        };
        cache.validate()?;
        let CacheOptions { ttl, strategy } = cache;

        let key = self.cache_key(&spec);
        let this = self.clone();
        strategy
            .resolve(&self.cache, key, ttl, move || async move {
                this.execute(spec, timeout, retry).await
            })
            .await
    }

    /// GET with the client default policies.
    pub async fn get<T: DeserializeOwned>(
        &self,
        target: &str,
        cache: Option<CacheOptions>,
    ) -> Result<T> {
        self.request(get_spec(target, cache)).await
    }

    pub async fn post<T: DeserializeOwned>(&self, target: &str, body: JsonValue) -> Result<T> {
        self.request(post_spec(target, body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, target: &str, body: JsonValue) -> Result<T> {
        self.request(put_spec(target, body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        self.request(delete_spec(target)).await
    }

    /// Uploads raw file contents with the longest timeout and most retries.
    pub async fn upload<T: DeserializeOwned>(&self, target: &str, contents: Vec<u8>) -> Result<T> {
        self.request(upload_spec(target, contents)).await
    }

    /// Runs `spec` with the critical retry policy.
    pub async fn critical<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T> {
        self.request(critical_spec(spec)).await
    }

    /// Runs `spec` with the read-only retry policy.
    ///
    /// Without explicit cache options the response is cached for five
    /// minutes using stale-while-revalidate.
    pub async fn read_only<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T> {
        self.request(read_only_spec(spec)).await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drops every cached response whose key contains `pattern`.
    pub fn invalidate_cache(&self, pattern: &str) -> usize {
        self.cache.invalidate_by_pattern(pattern)
    }

    async fn execute(
        &self,
        spec: RequestSpec,
        timeout: TimeoutPolicy,
        retry: RetryPolicy,
    ) -> Result<JsonValue> {
        let spec = &spec;
        execute_with_retry(&retry, move || async move {
            let response = self.perform_call(spec, timeout).await?;
            decode_response(response)
        })
        .await
    }

    /// JSON content type, then client authorization, then caller headers.
    /// Later entries replace earlier ones with the same name.
    fn build_headers(&self, spec: &RequestSpec) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(authorization) = &self.authorization {
            let value = HeaderValue::from_str(authorization).map_err(|_| {
                RequestError::InvalidHeader("authorization value is not a valid header".to_owned())
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        for (name, value) in &spec.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RequestError::InvalidHeader(format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                RequestError::InvalidHeader(format!("invalid value for header '{name}'"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Issues one request, aborting it when the timeout watchdog fires.
    async fn perform_call(&self, spec: &RequestSpec, timeout: TimeoutPolicy) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, spec.target);
        let headers = self.build_headers(spec)?;
        let mut request = self.http.request(spec.method.clone(), url).headers(headers);
        request = match &spec.body {
            Some(RequestBody::Json(value)) => request.body(value.to_string()),
            Some(RequestBody::Bytes(bytes)) => request.body(bytes.clone()),
            None => request,
        };

        let watchdog = timeout.watchdog();
        let call = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        match tokio::time::timeout(watchdog, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) if err.is_timeout() => Err(timeout_error(watchdog)),
            Ok(Err(err)) => Err(RequestError::Network(err)),
            Err(_elapsed) => Err(timeout_error(watchdog)),
        }
    }
}

fn get_spec(target: &str, cache: Option<CacheOptions>) -> RequestSpec {
    let mut spec = RequestSpec::get(target);
    spec.cache = cache;
    spec
}

fn post_spec(target: &str, body: JsonValue) -> RequestSpec {
    RequestSpec::post(target)
        .json(body)
        .timeout(TimeoutPolicy::NORMAL)
        .retry(RetryPolicy::DEFAULT)
}

fn put_spec(target: &str, body: JsonValue) -> RequestSpec {
    RequestSpec::new(Method::PUT, target)
        .json(body)
        .timeout(TimeoutPolicy::NORMAL)
        .retry(RetryPolicy::IDEMPOTENT)
}

fn delete_spec(target: &str) -> RequestSpec {
    RequestSpec::new(Method::DELETE, target)
        .timeout(TimeoutPolicy::FAST)
        .retry(RetryPolicy::IDEMPOTENT)
}

fn upload_spec(target: &str, contents: Vec<u8>) -> RequestSpec {
    RequestSpec::post(target)
        .header(header::CONTENT_TYPE.as_str(), "application/octet-stream")
        .bytes(contents)
        .timeout(TimeoutPolicy::FILE_UPLOAD)
        .retry(RetryPolicy::CRITICAL)
}

fn critical_spec(spec: RequestSpec) -> RequestSpec {
    spec.retry(RetryPolicy::CRITICAL)
}

fn read_only_spec(mut spec: RequestSpec) -> RequestSpec {
    if spec.cache.is_none() {
        spec.cache = Some(CacheOptions::new(
            READ_ONLY_CACHE_TTL,
            CacheStrategy::StaleWhileRevalidate,
        ));
    }
    spec.retry(RetryPolicy::READ_ONLY)
}

fn timeout_error(watchdog: Duration) -> RequestError {
    RequestError::Timeout {
        after_ms: watchdog.as_millis() as u64,
    }
}

fn decode_response(response: RawResponse) -> Result<JsonValue> {
    let RawResponse { status, body } = response;
    if !(200..300).contains(&status) {
        return Err(RequestError::Http { status, body });
    }
    if body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&body)
        .map_err(|err| RequestError::Decode(format!("invalid response JSON: {err}; body: {body}")))
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
