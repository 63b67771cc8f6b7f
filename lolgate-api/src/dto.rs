//! Response bodies produced by the gateway itself.

use serde::{Deserialize, Serialize};

use lolgate_core::constants::{SERVICE_AUTHORS, SERVICE_NAME, SERVICE_REPOSITORY};

/// Payload of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Service name
    pub name: String,
    /// Gateway version
    pub version: String,
    /// Maintainers
    pub author: String,
    /// Source repository
    pub repository: String,
}

impl ServiceInfo {
    /// Identity of this build.
    pub fn current() -> Self {
        Self {
            name: SERVICE_NAME.into(),
            version: env!("CARGO_PKG_VERSION").into(),
            author: SERVICE_AUTHORS.into(),
            repository: SERVICE_REPOSITORY.into(),
        }
    }
}

/// Payload of `GET /summoner/:id/clear`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearCacheResponse {
    /// Confirmation text
    pub message: String,
}

impl ClearCacheResponse {
    /// The fixed confirmation.
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".into(),
        }
    }
}

/// Failure raised by the gateway (not found, rate limited, internal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayErrorBody {
    /// HTTP status code
    pub error: u16,
    /// Human-readable message
    pub message: String,
}

/// Failure passed through from the upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamErrorBody {
    /// Upstream error code
    pub code: u16,
    /// Upstream error message
    pub message: String,
}
