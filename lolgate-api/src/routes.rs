//! API route configuration.

use std::sync::Arc;

use axum::{middleware, Router};

use crate::admission::admission_layer;
use crate::handlers;
use crate::state::AppState;

/// Creates the router: admission control in front of the dispatcher.
///
/// Path matching happens in the route table, so axum only sees a fallback.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handlers::gateway)
        .layer(middleware::from_fn_with_state(state.clone(), admission_layer))
        .with_state(state)
}
