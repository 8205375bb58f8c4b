//! `RelayServer`: Axum HTTP + WebSocket front end.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use pointrelay_core::dispatch::CommandDispatcher;
use pointrelay_core::{ConnectionId, Registry};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::transport::WsTransport;
use crate::websocket::connection::ConnectionDirectory;
use crate::websocket::session::{SessionContext, run_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Everything a new session needs.
    pub session: SessionContext,
    /// One permit per allowed live connection.
    pub slots: Arc<Semaphore>,
    /// Shutdown coordinator; tracks running sessions.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Upgrade refused at or above this many live connections.
    pub max_connections: usize,
    /// Max inbound frame size.
    pub max_message_size: usize,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    directory: Arc<ConnectionDirectory>,
    slots: Arc<Semaphore>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        let permits = config.max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            slots: Arc::new(Semaphore::new(permits)),
            config,
            registry: Arc::new(Registry::new()),
            directory: Arc::new(ConnectionDirectory::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session: SessionContext {
                dispatcher: CommandDispatcher::new(self.registry.clone()),
                directory: self.directory.clone(),
                policy: self.config.session_policy(),
                shutdown: self.shutdown.token(),
            },
            slots: self.slots.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            max_connections: self.config.max_connections,
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });

        info!(addr = %local, "pointrelay listening");
        Ok((local, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the point registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Connection slots not yet taken.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Get the live connection directory.
    pub fn directory(&self) -> &Arc<ConnectionDirectory> {
        &self.directory
    }
}

/// GET / and GET /ws: upgrade to a relay session.
///
/// The connection slot is taken before the upgrade and released when the
/// session ends, so concurrent upgrades cannot overshoot the cap.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Ok(permit) = state.slots.clone().try_acquire_owned() else {
        warn!(max = state.max_connections, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };

    let AppState {
        session,
        shutdown,
        max_message_size,
        ..
    } = state;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| {
            shutdown.track_session(async move {
                let conn = ConnectionId::new();
                let _ = run_session(WsTransport::new(socket), conn, session).await;
                drop(permit);
            })
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.session.directory.count();
    let points = state.session.dispatcher.registry().point_count();
    Json(health::health_check(state.start_time, connections, points))
}
