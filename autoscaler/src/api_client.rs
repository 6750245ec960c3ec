//! Shared HTTP client against the orchestrator.
//!
//! `CachedGet` is backed by a [`moka::future::Cache`]: `get_with`
//! provides native request coalescing (at most one in-flight upstream
//! fetch per key across arbitrary concurrent callers) and
//! `invalidate_all` provides the atomic `EvictAll` the supervisor calls
//! once per reconciliation interval. No custom mutex-guarded map or
//! coalescing structure is needed — moka already is the cache backend
//! this stack reaches for in-process.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use moka::future::Cache;
use reqwest::Method;
use url::Url;

use crate::{error::RuntimeError, types::Secret};

pub struct ApiClient {
    http: reqwest::Client,
    cache: Cache<String, Bytes>,
    request_timeout: Duration,
    bearer_token: Option<Secret<String>>,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        request_timeout: Duration,
        bearer_token: Option<Secret<String>>,
    ) -> Self {
        Self {
            http,
            cache: Cache::builder().build(),
            request_timeout,
            bearer_token,
        }
    }

    /// Issues a live request. Non-GET methods, and GETs that bypass the
    /// cache (e.g. the app-lookup used to build a fresh `Exists()`
    /// result right after a write), always hit the network.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Bytes, RuntimeError> {
        let mut builder = self.http.request(method, url.clone());
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = tokio::time::timeout(self.request_timeout, builder.send())
            .await
            .map_err(|_| {
                RuntimeError::Timeout(url.to_string(), self.request_timeout)
            })?
            .map_err(|e| RuntimeError::Transport(url.to_string(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = tokio::time::timeout(
                self.request_timeout,
                response.text(),
            )
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
            return Err(RuntimeError::Http {
                status: status.as_u16(),
                path: url.to_string(),
                body,
            });
        }

        tokio::time::timeout(self.request_timeout, response.bytes())
            .await
            .map_err(|_| {
                RuntimeError::Timeout(url.to_string(), self.request_timeout)
            })?
            .map_err(|e| RuntimeError::Transport(url.to_string(), e.to_string()))
    }

    /// Returns a cached body for `url` if present, otherwise performs
    /// exactly one upstream `GET` on behalf of every concurrent caller
    /// requesting the same `url` and caches the result.
    pub async fn cached_get(&self, url: Url) -> Result<Bytes, RuntimeError> {
        let key = url.to_string();
        self.cache
            .try_get_with(key, self.request(Method::GET, url, None))
            .await
            .map_err(|arc_err: Arc<RuntimeError>| (*arc_err).clone())
    }

    /// Atomically invalidates every cached entry. The next `cached_get`
    /// for any key will hit upstream.
    pub fn evict_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    #[tokio::test]
    async fn cached_get_coalesces_concurrent_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("ok")
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(ApiClient::new(
            reqwest::Client::new(),
            Duration::from_secs(5),
            None,
        ));
        let url = Url::parse(&format!("{}/thing", server.uri())).unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let client = client.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                client.cached_get(url).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Bytes::from_static(b"ok"));
        }
    }

    #[tokio::test]
    async fn evict_all_forces_a_fresh_upstream_fetch() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(move |_: &wiremock::Request| {
                ResponseTemplate::new(200).set_body_string("ok")
            })
            .expect(2)
            .mount(&server)
            .await;
        let _ = &hits;

        let client = ApiClient::new(
            reqwest::Client::new(),
            Duration::from_secs(5),
            None,
        );
        let url = Url::parse(&format!("{}/thing", server.uri())).unwrap();

        client.cached_get(url.clone()).await.unwrap();
        client.cached_get(url.clone()).await.unwrap();
        client.evict_all();
        client.cached_get(url).await.unwrap();
    }
}
