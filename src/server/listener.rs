//! Broadcast server listener
//!
//! Builds the axum router (health endpoint plus WebSocket upgrades) and
//! serves it until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::serve::ListenerExt;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::error::Result;
use crate::hub::Hub;
use crate::server::config::ServerConfig;
use crate::server::connection::ws_handler;
use crate::server::health::health_handler;

/// Shared state handed to axum handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub connection_semaphore: Option<Arc<Semaphore>>,
    pub send_queue_capacity: usize,
}

/// WebSocket broadcast server
pub struct BroadcastServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl BroadcastServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let hub = Arc::new(Hub::new(config.heartbeat_interval));

        Self {
            config,
            hub,
            connection_semaphore,
        }
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the router: the health path answers plain GETs, every other
    /// path upgrades to a WebSocket peer
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            connection_semaphore: self.connection_semaphore.clone(),
            send_queue_capacity: self.config.send_queue_capacity,
        };

        Router::new()
            .route(&self.config.health_path, get(health_handler))
            .fallback(ws_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(self.config.handshake_timeout))
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Broadcast server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve an already bound listener until `shutdown` resolves
    ///
    /// On shutdown the heartbeat stops and every connected peer is closed.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.hub.start_heartbeat();

        let nodelay = self.config.tcp_nodelay;
        let listener = listener.tap_io(move |tcp| {
            if nodelay {
                if let Err(e) = tcp.set_nodelay(true) {
                    tracing::warn!(error = %e, "Failed to set TCP_NODELAY");
                }
            }
        });

        // Peers are closed as soon as the signal fires; upgraded sockets are
        // not tracked by axum's graceful shutdown
        let hub = Arc::clone(&self.hub);
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            hub.shutdown().await;
        };

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;

        self.hub.shutdown().await;

        result?;
        Ok(())
    }
}
