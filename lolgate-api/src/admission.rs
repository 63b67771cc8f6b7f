//! Admission control.
//!
//! Fixed-window request counter per client identity. Rejected requests are
//! answered here and never reach the dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lolgate_core::constants::{DEFAULT_RATE_MAX, DEFAULT_RATE_WINDOW};

use crate::error::ApiError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Admission configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Length of one window
    pub window: Duration,
    /// Requests allowed per identity per window
    pub max_requests: u32,
    /// Take the client identity from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_WINDOW,
            max_requests: DEFAULT_RATE_MAX,
            trust_proxy: true,
        }
    }
}

#[derive(Debug)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

/// Outcome of one admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured maximum
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Time until the window resets
    pub reset_in: Duration,
}

impl Decision {
    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_secs()));
        if !self.allowed {
            headers.insert("retry-after", HeaderValue::from(self.reset_secs()));
        }
    }

    fn reset_secs(&self) -> u64 {
        // Round up so clients never retry before the reset.
        let secs = self.reset_in.as_secs();
        if self.reset_in.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Per-worker fixed-window limiter.
pub struct AdmissionController {
    windows: DashMap<String, RateWindow>,
    config: AdmissionConfig,
}

impl AdmissionController {
    /// Creates a controller.
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Counts one request from `identity`.
    pub fn check(&self, identity: &str) -> Decision {
        self.check_at(identity, Instant::now())
    }

    /// Counts one request from `identity` at `now`.
    ///
    /// Reset, threshold test, and increment happen under the entry lock.
    pub fn check_at(&self, identity: &str, now: Instant) -> Decision {
        let limit = self.config.max_requests;
        let mut window = self
            .windows
            .entry(identity.to_string())
            .or_insert_with(|| RateWindow {
                started_at: now,
                count: 0,
            });

        if now.saturating_duration_since(window.started_at) >= self.config.window {
            window.started_at = now;
            window.count = 0;
        }
        let reset_in = self
            .config
            .window
            .saturating_sub(now.saturating_duration_since(window.started_at));

        if window.count >= limit {
            return Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_in,
            };
        }

        window.count += 1;
        Decision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_in,
        }
    }

    /// Drops windows that have elapsed. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let before = self.windows.len();
        let window = self.config.window;
        self.windows.retain(|_, w| w.started_at.elapsed() < window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of identities with an open window.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Client identity for a request.
///
/// With `trust_proxy`, the first `X-Forwarded-For` hop wins over the peer.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware running the admission check ahead of the dispatcher.
pub async fn admission_layer(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer, state.admission.config().trust_proxy);

    let decision = state.admission.check(&identity);
    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        debug!(client = %identity, "Rejected by admission control");
        ApiError::too_many_requests().into_response()
    };
    decision.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max_requests: u32, window: Duration) -> AdmissionController {
        AdmissionController::new(AdmissionConfig {
            window,
            max_requests,
            trust_proxy: true,
        })
    }

    #[test]
    fn test_fourth_request_rejected_then_window_resets() {
        let limiter = controller(3, Duration::from_secs(600));
        let start = Instant::now();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("1.2.3.4", start);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        assert!(!limiter.check_at("1.2.3.4", start + Duration::from_secs(599)).allowed);

        let after = limiter.check_at("1.2.3.4", start + Duration::from_secs(600));
        assert!(after.allowed);
        assert_eq!(after.remaining, 2);
    }

    #[test]
    fn test_window_is_fixed_not_rolling() {
        let limiter = controller(2, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("a", start).allowed);
        assert!(limiter.check_at("a", start + Duration::from_secs(9)).allowed);
        // A rolling window would still count the request at t=9.
        let reset = limiter.check_at("a", start + Duration::from_secs(10));
        assert!(reset.allowed);
        assert_eq!(reset.reset_in, Duration::from_secs(10));
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = controller(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_concurrent_boundary_admits_exactly_max() {
        let limiter = Arc::new(controller(50, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.check("same").allowed).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_prune_drops_elapsed_windows() {
        let limiter = controller(5, Duration::from_millis(200));
        limiter.check("a");
        std::thread::sleep(Duration::from_millis(250));
        limiter.check("b");
        assert_eq!(limiter.prune(), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_client_identity() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, Some(peer), true), "10.0.0.1");
        assert_eq!(client_identity(&headers, None, true), "unknown");

        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_identity(&headers, Some(peer), true), "203.0.113.9");
        assert_eq!(client_identity(&headers, Some(peer), false), "10.0.0.1");
    }

    #[test]
    fn test_reset_header_rounds_up() {
        let decision = Decision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_in: Duration::from_millis(1500),
        };
        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);
        assert_eq!(headers["x-ratelimit-reset"], "2");
        assert_eq!(headers["retry-after"], "2");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
    }
}
