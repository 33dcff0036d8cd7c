//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router (upgrade path + status)
//! - Apply transport limits to the upgrade
//! - Hand each upgraded socket to its own session
//! - Serve until the shutdown signal fires, then close live sessions

use std::io;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::status;
use crate::lifecycle::ShutdownSignal;
use crate::net::{self, Hub, SessionSettings};
use crate::routing::Handler;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub handler: Arc<dyn Handler>,
    pub settings: SessionSettings,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

/// WebSocket server: accepts upgrades and runs one session per socket.
pub struct WsServer {
    router: Router,
    config: ServerConfig,
    hub: Hub,
}

impl WsServer {
    /// Create a server dispatching every message to `handler`.
    ///
    /// Spawns the hub loop, so it must be called inside a Tokio runtime.
    pub fn new(config: ServerConfig, handler: impl Handler + 'static) -> Self {
        let hub = Hub::spawn();
        let state = AppState {
            hub: hub.clone(),
            handler: Arc::new(handler),
            settings: SessionSettings::from(&config.session),
        };
        let router = Self::build_router(&config, state);
        Self { router, config, hub }
    }

    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.listener.path, get(upgrade_handler))
            .route("/status", get(status::get_status))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = &self.config.listener.bind_address;
        TcpListener::bind(address).await.map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.listener.path,
            "WebSocket server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        // Upgraded sockets outlive the HTTP server; close them explicitly so
        // every peer gets a Close frame.
        let grace = SessionSettings::from(&self.config.session).write_deadline;
        let closed = self.hub.close_all(grace).await;
        tracing::info!(sessions = closed, "WebSocket server stopped");
        Ok(())
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// The HTTP router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn upgrade_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.max_message_size(state.settings.max_message_size)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| net::serve(socket, state.hub, state.handler, state.settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Router as MessageRouter;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn status_reports_zero_sessions() {
        let server = WsServer::new(ServerConfig::default(), MessageRouter::new());
        let response = server
            .router()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let status: status::SystemStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(status.active_sessions, 0);
        assert_eq!(status.status, "operational");
    }

    #[tokio::test]
    async fn plain_get_on_upgrade_path_is_rejected() {
        let server = WsServer::new(ServerConfig::default(), MessageRouter::new());
        let response = server
            .router()
            .oneshot(Request::get("/conn").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let server = WsServer::new(ServerConfig::default(), MessageRouter::new());
        let response = server
            .router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
