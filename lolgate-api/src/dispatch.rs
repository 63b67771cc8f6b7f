//! Route dispatcher.
//!
//! Per request: resolve the route, consult the cache, call upstream on a
//! miss, store the result, answer. Failures are never cached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, warn};

use lolgate_cache::ResponseCache;
use lolgate_core::error::{GatewayError, Result};
use lolgate_core::{CacheKey, Params, Upstream};

use crate::dto::{ClearCacheResponse, ServiceInfo};
use crate::table::{RouteEntry, RouteTable, RouteTarget};

/// Cache key of the service root.
const SERVICE_INFO_KEY: &str = "serviceInfo";

/// How a reply was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from cache.
    Hit,
    /// Fetched and stored.
    Miss,
    /// Route is not cached.
    Bypass,
}

impl CacheStatus {
    fn as_header(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        })
    }
}

/// A successful gateway response.
#[derive(Clone, Debug)]
pub struct Reply {
    /// JSON body
    pub body: Bytes,
    /// Where the body came from
    pub cache: CacheStatus,
    /// Remaining freshness for cacheable routes
    pub max_age: Option<Duration>,
}

impl Reply {
    fn bypass(body: Bytes) -> Self {
        Self {
            body,
            cache: CacheStatus::Bypass,
            max_age: None,
        }
    }

    /// Parses the body back into JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-cache", self.cache.as_header());
        if let Some(max_age) = self.max_age {
            if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age.as_secs())) {
                headers.insert(header::CACHE_CONTROL, value);
            }
        }
        response
    }
}

/// Owns one worker's route table, cache, and upstream handle.
pub struct Dispatcher {
    routes: RouteTable,
    cache: ResponseCache,
    upstream: Arc<dyn Upstream>,
}

impl Dispatcher {
    /// Creates a dispatcher over already-validated parts.
    pub fn new(routes: RouteTable, cache: ResponseCache, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            routes,
            cache,
            upstream,
        }
    }

    /// The worker's response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Serves one request.
    pub async fn dispatch(&self, path: &str, query: &Params) -> Result<Reply> {
        let (entry, path_params) = self.routes.resolve(path).ok_or(GatewayError::RouteNotFound)?;

        match entry.target {
            RouteTarget::ClearCache => {
                let id = path_params
                    .get("id")
                    .ok_or_else(|| GatewayError::Internal("clear route without id".into()))?;
                let removed = self.cache.purge_group(id);
                info!(group = id, removed, "Cache group cleared");
                let body = serde_json::to_vec(&ClearCacheResponse::cleared())?;
                Ok(Reply::bypass(Bytes::from(body)))
            }
            RouteTarget::ServiceInfo => {
                let key = CacheKey::from(SERVICE_INFO_KEY);
                self.through_cache(entry, key, None, || async {
                    serde_json::to_value(ServiceInfo::current()).map_err(GatewayError::from)
                })
                .await
            }
            RouteTarget::Upstream(operation) => {
                let params = if entry.skip_params {
                    Params::new()
                } else {
                    Params::merge(query, &path_params)
                };
                let key = CacheKey::new(operation.name(), &params);
                let group = entry.cache_group(&path_params);
                let upstream = Arc::clone(&self.upstream);

                self.through_cache(entry, key, group, || async move {
                    upstream.call(operation, &params).await.map_err(|err| {
                        warn!(op = %operation, code = err.code(), error = %err, "Upstream failure");
                        GatewayError::from(err)
                    })
                })
                .await
            }
        }
    }

    async fn through_cache<F, Fut>(
        &self,
        entry: &RouteEntry,
        key: CacheKey,
        group: Option<String>,
        fetch: F,
    ) -> Result<Reply>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if !entry.tier.is_cacheable() {
            let value = fetch().await?;
            return Ok(Reply::bypass(Bytes::from(serde_json::to_vec(&value)?)));
        }

        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "Cache hit");
            return Ok(Reply {
                body: hit.payload,
                cache: CacheStatus::Hit,
                max_age: Some(hit.remaining),
            });
        }

        let value = fetch().await?;
        let body = Bytes::from(serde_json::to_vec(&value)?);
        self.cache.put(key.clone(), body.clone(), entry.tier, group);
        debug!(%key, tier = %entry.tier, "Cache miss stored");

        Ok(Reply {
            body,
            cache: CacheStatus::Miss,
            max_age: entry.tier.ttl(),
        })
    }
}
