//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lolgate_core::error::{GatewayError, UpstreamError};

use crate::dto::{GatewayErrorBody, UpstreamErrorBody};

#[derive(Debug)]
enum ErrorBody {
    Gateway(GatewayErrorBody),
    Upstream(UpstreamErrorBody),
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn gateway(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::Gateway(GatewayErrorBody {
                error: status.as_u16(),
                message: message.into(),
            }),
        }
    }

    /// Not found error.
    pub fn not_found() -> Self {
        Self::gateway(StatusCode::NOT_FOUND, "Not Found")
    }

    /// Rate limit error.
    pub fn too_many_requests() -> Self {
        Self::gateway(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
    }

    /// Internal server error.
    pub fn internal() -> Self {
        Self::gateway(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }

    /// Upstream failure; the upstream code doubles as the HTTP status when
    /// it is a valid error status.
    pub fn upstream(err: &UpstreamError) -> Self {
        let code = err.code();
        let status = StatusCode::from_u16(code)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self {
            status,
            body: ErrorBody::Upstream(UpstreamErrorBody {
                code,
                message: err.message(),
            }),
        }
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.body {
            ErrorBody::Gateway(body) => (self.status, Json(body)).into_response(),
            ErrorBody::Upstream(body) => (self.status, Json(body)).into_response(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::RouteNotFound => ApiError::not_found(),
            GatewayError::RateLimited => ApiError::too_many_requests(),
            GatewayError::Upstream(upstream) => ApiError::upstream(upstream),
            GatewayError::Internal(_) | GatewayError::Config(_) | GatewayError::Json(_) => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal()
            }
        }
    }
}
