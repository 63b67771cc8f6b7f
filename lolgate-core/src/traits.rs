//! Common traits for lolgate.
//!
//! The upstream client sits behind a trait so workers can run against the
//! real HTTP API and tests against an in-process fake.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::types::{Operation, Params};

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// The rate-limited game-data API the gateway fronts.
///
/// Implementations do no caching of their own. Timeouts are theirs to
/// enforce and surface as `UpstreamError::Transport`.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Calls one upstream operation with the merged request options.
    async fn call(&self, operation: Operation, params: &Params) -> Result<Value, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl Upstream for Echo {
        async fn call(&self, operation: Operation, params: &Params) -> Result<Value, UpstreamError> {
            if params.contains("fail") {
                return Err(UpstreamError::from_status(500, "nope"));
            }
            Ok(serde_json::json!({ "op": operation.name(), "params": params }))
        }
    }

    #[tokio::test]
    async fn test_trait_object_call() {
        let upstream: Arc<dyn Upstream> = Arc::new(Echo);
        let mut params = Params::new();
        params.insert("id", "7");

        let value = upstream.call(Operation::GetChampionDataById, &params).await.unwrap();
        assert_eq!(value["op"], "getChampionDataById");
        assert_eq!(value["params"]["id"], "7");

        params.insert("fail", "1");
        let err = upstream.call(Operation::GetChampionDataById, &params).await.unwrap_err();
        assert_eq!(err.code(), 500);
    }
}
