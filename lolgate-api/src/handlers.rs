//! Request handlers.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use tracing::error;

use lolgate_core::error::GatewayError;
use lolgate_core::Params;

use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Every request path goes through the dispatcher; only GET is routed.
pub async fn gateway(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Result<Response> {
    if method != Method::GET {
        return Err(GatewayError::RouteNotFound.into());
    }

    let query: Params = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).collect())
        .unwrap_or_default();

    let reply = state.dispatcher.dispatch(uri.path(), &query).await?;
    Ok(reply.into_response())
}

/// Converts a panic inside a request into the 500 body.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Request handler panicked");
    ApiError::internal().into_response()
}
