//! # lolgate API
//!
//! The request-handling pipeline one worker runs: admission control, route
//! resolution, response cache, upstream call.
//!
//! ## Endpoints
//!
//! - `GET /` - Service identity, cached 1 day
//! - `GET /status` - Upstream status passthrough, never cached
//! - `GET /summoner/:id` and siblings - Cached 1 day, grouped by `:id`
//! - `GET /summoner/:id/activeGame` - Never cached
//! - `GET /summoner/:id/clear` - Purges every cached view of `:id`
//! - `GET /static/*`, `/match/:id`, `/leagues/*` - Cached 12 hours
//!
//! ## Example
//!
//! ```rust,ignore
//! use lolgate_api::{GatewayConfig, GatewayServer};
//!
//! let config = GatewayConfig::from_env();
//! let listener = lolgate_api::bind_shared(config.listen_addr())?;
//! GatewayServer::new(config)?.run(listener).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod admission;
mod dispatch;
mod dto;
mod error;
mod handlers;
mod routes;
mod state;
mod table;

pub use admission::{client_identity, AdmissionConfig, AdmissionController, Decision};
pub use dispatch::{CacheStatus, Dispatcher, Reply};
pub use dto::{ClearCacheResponse, GatewayErrorBody, ServiceInfo, UpstreamErrorBody};
pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, GatewayConfig};
pub use table::{RouteEntry, RouteTable, RouteTarget};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::{TcpListener, TcpSocket};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use lolgate_core::constants::SWEEP_INTERVAL;

/// One worker's HTTP server.
pub struct GatewayServer {
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Creates a server with the HTTP upstream client.
    pub fn new(config: GatewayConfig) -> lolgate_core::Result<Self> {
        Ok(Self::from_state(Arc::new(AppState::new(config)?)))
    }

    /// Creates a server over prepared state.
    pub fn from_state(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Shared worker state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all layers configured.
    ///
    /// Panics inside a request are answered with a 500 and do not take the
    /// worker down.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(CatchPanicLayer::custom(handlers::handle_panic))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serves on `listener` until the process is stopped.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        self.run_until(listener, std::future::pending()).await
    }

    /// Serves on `listener` until `shutdown` resolves.
    pub async fn run_until(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let sweeper = tokio::spawn(sweep(self.state.clone()));

        info!("lolgate worker listening on {}", addr);

        let result = axum::serve(
            listener,
            self.router().into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        sweeper.abort();
        result
    }
}

/// Periodically drops expired cache entries and elapsed rate windows.
async fn sweep(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let entries = state.dispatcher.cache().cleanup_expired();
        let windows = state.admission.prune();
        debug!(entries, windows, "Swept expired state");
    }
}

/// Binds a listener several worker processes can share.
///
/// On unix the port is opened with `SO_REUSEPORT`, so the kernel spreads
/// connections across workers.
pub fn bind_shared(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(unix)]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Starts a single worker with configuration from the environment.
pub async fn start_worker() -> std::io::Result<()> {
    let config = GatewayConfig::from_env();
    let listener = bind_shared(config.listen_addr())?;
    let server = GatewayServer::new(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    server.run(listener).await
}
