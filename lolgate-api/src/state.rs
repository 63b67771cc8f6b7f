//! Worker state: config, dispatcher, admission controller.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use lolgate_cache::{CacheConfig, ResponseCache};
use lolgate_core::constants::{DEFAULT_PORT, DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL};
use lolgate_core::error::Result;
use lolgate_core::Upstream;
use lolgate_upstream::{HttpUpstream, UpstreamConfig};

use crate::admission::{AdmissionConfig, AdmissionController};
use crate::dispatch::Dispatcher;
use crate::table::RouteTable;

/// Configuration of one worker, loaded once at startup.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Listen address
    pub bind: IpAddr,
    /// Listen port, shared by every worker
    pub port: u16,
    /// Upstream client settings
    pub upstream: UpstreamConfig,
    /// Rate limit settings
    pub admission: AdmissionConfig,
    /// Response cache settings
    pub cache: CacheConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            upstream: UpstreamConfig::default(),
            admission: AdmissionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Reads `.env` (if present) and the process environment.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let region = std::env::var("REGION")
            .ok()
            .filter(|r| !r.is_empty())
            .unwrap_or(defaults.upstream.region);

        Self {
            bind: env_parse("BIND", defaults.bind),
            port: env_parse("PORT", defaults.port),
            upstream: UpstreamConfig {
                base_url: std::env::var("UPSTREAM_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.into()),
                region,
                api_key: std::env::var("KEY").ok().filter(|k| !k.is_empty()),
                timeout_seconds: env_parse("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS),
            },
            admission: AdmissionConfig {
                window: Duration::from_secs(env_parse(
                    "RATE_LIMIT_WINDOW_SECS",
                    defaults.admission.window.as_secs(),
                )),
                max_requests: env_parse("RATE_LIMIT_MAX", defaults.admission.max_requests),
                trust_proxy: std::env::var("TRUST_PROXY")
                    .map(|v| v != "false" && v != "0")
                    .unwrap_or(defaults.admission.trust_proxy),
            },
            cache: CacheConfig {
                max_entries: env_parse("CACHE_MAX_ENTRIES", defaults.cache.max_entries),
                ..defaults.cache
            },
        }
    }

    /// Socket address the worker listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "Ignoring unparseable environment value");
            default
        }),
        Err(_) => default,
    }
}

/// Everything one worker owns. Nothing here is shared across workers.
pub struct AppState {
    /// Configuration the worker started with
    pub config: GatewayConfig,
    /// Route table, cache and upstream
    pub dispatcher: Dispatcher,
    /// Per-client rate windows
    pub admission: AdmissionController,
}

impl AppState {
    /// Builds state with the HTTP upstream client.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let upstream = HttpUpstream::with_config(config.upstream.clone())?;
        Self::with_upstream(config, Arc::new(upstream))
    }

    /// Builds state over any upstream implementation.
    pub fn with_upstream(config: GatewayConfig, upstream: Arc<dyn Upstream>) -> Result<Self> {
        let routes = RouteTable::standard()?;
        let cache = ResponseCache::with_config(config.cache.clone());
        let admission = AdmissionController::new(config.admission.clone());

        Ok(Self {
            dispatcher: Dispatcher::new(routes, cache, upstream),
            admission,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr().port(), 3001);
        assert_eq!(config.admission.max_requests, 1000);
        assert_eq!(config.admission.window, Duration::from_secs(600));
    }

    #[test]
    fn test_env_parse_fallback() {
        std::env::set_var("LOLGATE_TEST_PORT", "not-a-port");
        assert_eq!(env_parse("LOLGATE_TEST_PORT", 3001u16), 3001);
        std::env::set_var("LOLGATE_TEST_PORT", " 8080 ");
        assert_eq!(env_parse("LOLGATE_TEST_PORT", 3001u16), 8080);
        std::env::remove_var("LOLGATE_TEST_PORT");
        assert_eq!(env_parse("LOLGATE_TEST_PORT", 3001u16), 3001);
    }

    #[test]
    fn test_state_builds_standard_table() {
        let state = AppState::new(GatewayConfig::default()).unwrap();
        assert_eq!(state.dispatcher.routes().len(), 35);
        assert!(state.dispatcher.cache().is_empty());
    }
}
