use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use log::warn;
use mantle_platform::AppPaths;
use reqwest::StatusCode;
use reqwest::header::{
    ETAG, HeaderMap, HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
    USER_AGENT,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::cache::{DEFAULT_CACHE_CAPACITY, ResponseCache};
use crate::resolver::DohResolver;

/// Fixed identifying header on every outbound request.
pub const USER_AGENT_VALUE: &str = "MantleManager";

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A completed transport exchange. Non-2xx statuses are *not* errors; the
/// caller interprets them.
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

impl FetchResponse {
    /// Deserialize the body as JSON.
    ///
    /// # Errors
    /// Returns an error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client shared by the whole process: DoH-first resolution, a fixed
/// `User-Agent`, and a bounded disk cache with conditional revalidation.
pub struct CachedClient {
    client: reqwest::Client,
    cache: Option<ResponseCache>,
}

/// Process-wide client instance, created on first use. Concurrent first
/// callers race on initialization; exactly one instance wins and everyone
/// observes it.
pub fn shared_client() -> Arc<CachedClient> {
    static SHARED: OnceLock<Arc<CachedClient>> = OnceLock::new();
    SHARED
        .get_or_init(|| {
            let cache_dir = AppPaths::new().ok().map(|paths| paths.http_cache_dir());
            Arc::new(CachedClient::new(cache_dir))
        })
        .clone()
}

impl CachedClient {
    /// Build a client, caching responses under `cache_dir` when given.
    /// Cache setup failures degrade to uncached operation.
    #[must_use]
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .default_headers(default_headers())
            .dns_resolver(Arc::new(DohResolver::new()))
            .build()
            .unwrap_or_else(|error| {
                warn!("Falling back to a default HTTP transport: {error}");
                reqwest::Client::new()
            });

        let cache = cache_dir.and_then(|dir| {
            match ResponseCache::open(dir, DEFAULT_CACHE_CAPACITY) {
                Ok(cache) => Some(cache),
                Err(error) => {
                    warn!("HTTP disk cache disabled: {error}");
                    None
                }
            }
        });

        Self { client, cache }
    }

    /// Start a GET request for `url`.
    pub fn get(&self, url: impl Into<String>) -> CachedRequest<'_> {
        CachedRequest {
            client: self,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    async fn execute(&self, url: &str, extra: HeaderMap) -> Result<FetchResponse, NetworkError> {
        let mut request = self.client.get(url).headers(extra);

        let validators = self
            .cache
            .as_ref()
            .and_then(|cache| cache.validators_for(url));
        if let Some(validators) = &validators {
            if let Some(etag) = validators.etag.as_deref() {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = validators.last_modified.as_deref() {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await?;
        let status = response.status();

        #[cfg(debug_assertions)]
        log_headers(url, status, response.headers());

        if status == StatusCode::NOT_MODIFIED
            && let Some(cache) = &self.cache
            && let Some(body) = cache.read_body(url)
        {
            return Ok(FetchResponse {
                status: StatusCode::OK,
                body,
                from_cache: true,
            });
        }

        let etag = header_string(response.headers(), &ETAG);
        let last_modified = header_string(response.headers(), &LAST_MODIFIED);
        let body = response.bytes().await?.to_vec();

        if status.is_success()
            && (etag.is_some() || last_modified.is_some())
            && let Some(cache) = &self.cache
        {
            cache.store(url, etag, last_modified, &body);
        }

        Ok(FetchResponse {
            status,
            body,
            from_cache: false,
        })
    }
}

/// One pending request against the shared client.
pub struct CachedRequest<'a> {
    client: &'a CachedClient,
    url: String,
    headers: HeaderMap,
}

impl CachedRequest<'_> {
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send the request, consulting and updating the disk cache.
    ///
    /// # Errors
    /// Returns an error only for transport-level failures (DNS, connect,
    /// TLS, timeout). HTTP error statuses are successful results.
    pub async fn send(self) -> Result<FetchResponse, NetworkError> {
        self.client.execute(&self.url, self.headers).await
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

// Header-level wire logging, compiled into debug builds only. Bodies are
// never logged.
#[cfg(debug_assertions)]
fn log_headers(url: &str, status: StatusCode, headers: &HeaderMap) {
    log::debug!("{status} <- GET {url}");
    for (name, value) in headers {
        log::debug!("  {name}: {}", value.to_str().unwrap_or("<binary>"));
    }
}
