//! Error types for lolgate.
//!
//! Two layers: `UpstreamError` is the typed failure surfaced by the upstream
//! client, `GatewayError` is everything a request can end in.

use thiserror::Error;

/// Result type alias using `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Typed failure returned by an upstream call.
///
/// The code and message survive all the way to the client response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Upstream quota exhausted.
    #[error("{message}")]
    RateLimited { message: String },

    /// Resource does not exist upstream.
    #[error("{message}")]
    NotFound { message: String },

    /// Upstream is down or in maintenance.
    #[error("{message}")]
    Unavailable { message: String },

    /// Any other non-success upstream status.
    #[error("{message}")]
    Status { code: u16, message: String },

    /// Request never completed (connect failure, timeout).
    #[error("Upstream transport error: {0}")]
    Transport(String),

    /// Upstream answered with a body that is not JSON.
    #[error("Upstream returned an undecodable body: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Builds the typed error for an upstream HTTP status.
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            429 => UpstreamError::RateLimited { message },
            404 => UpstreamError::NotFound { message },
            503 => UpstreamError::Unavailable { message },
            _ => UpstreamError::Status { code, message },
        }
    }

    /// Numeric code passed through to the client.
    pub fn code(&self) -> u16 {
        match self {
            UpstreamError::RateLimited { .. } => 429,
            UpstreamError::NotFound { .. } => 404,
            UpstreamError::Unavailable { .. } => 503,
            UpstreamError::Status { code, .. } => *code,
            UpstreamError::Transport(_) => 504,
            UpstreamError::Decode(_) => 502,
        }
    }

    /// Message passed through to the client.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UpstreamError::RateLimited { .. }
                | UpstreamError::Unavailable { .. }
                | UpstreamError::Transport(_)
        )
    }
}

/// Every way a gateway request can fail.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route template matches the request path.
    #[error("Not Found")]
    RouteNotFound,

    /// Rejected by the admission controller.
    #[error("Too many requests")]
    RateLimited,

    /// The upstream call failed; code and message are preserved.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Unexpected failure inside the dispatcher or cache.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid startup configuration (route table, env).
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RouteNotFound => 404,
            GatewayError::RateLimited => 429,
            GatewayError::Upstream(err) => err.code(),
            GatewayError::Internal(_) | GatewayError::Config(_) | GatewayError::Json(_) => 500,
        }
    }

    /// Returns true if the failure came from the upstream.
    pub fn is_upstream(&self) -> bool {
        matches!(self, GatewayError::Upstream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(429 => 429; "rate limited")]
    #[test_case(404 => 404; "not found")]
    #[test_case(503 => 503; "unavailable")]
    #[test_case(403 => 403; "forbidden passes through")]
    fn test_upstream_code_round_trips(code: u16) -> u16 {
        UpstreamError::from_status(code, "boom").code()
    }

    #[test]
    fn test_upstream_message_preserved() {
        let err = UpstreamError::from_status(404, "summoner missing");
        assert_eq!(err.message(), "summoner missing");
        assert!(matches!(err, UpstreamError::NotFound { .. }));
    }

    #[test]
    fn test_error_classification() {
        assert!(UpstreamError::from_status(429, "slow down").is_recoverable());
        assert!(UpstreamError::Transport("timeout".into()).is_recoverable());
        assert!(!UpstreamError::from_status(404, "gone").is_recoverable());
    }

    #[test]
    fn test_gateway_status_codes() {
        assert_eq!(GatewayError::RouteNotFound.status_code(), 404);
        assert_eq!(GatewayError::RateLimited.status_code(), 429);
        assert_eq!(GatewayError::Internal("x".into()).status_code(), 500);
        let upstream = GatewayError::from(UpstreamError::from_status(418, "teapot"));
        assert_eq!(upstream.status_code(), 418);
        assert!(upstream.is_upstream());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let gateway_result: Result<serde_json::Value> = json_result.map_err(GatewayError::from);
        assert!(matches!(gateway_result, Err(GatewayError::Json(_))));
    }
}
