//! socket-router server.
//!
//! ```text
//!   Client ──ws──▶ http (upgrade) ──▶ net::Session
//!                                        │ inbound pump: one request at a time
//!                                        ▼
//!                                  middleware::Chain
//!                                  Recovery ─▶ Router ─▶ handler
//!                                        │ send_response
//!                                        ▼
//!   Client ◀──ws── outbound pump ◀── session queue
//! ```

use std::path::PathBuf;

use clap::Parser;

use socket_router::config::{load_config, validate_config, ConfigError, ServerConfig};
use socket_router::lifecycle::{shutdown_signal, Shutdown};
use socket_router::observability::{init_logging, init_metrics};
use socket_router::{Chain, HandlerResult, Request, Response, Router, Session, WsServer};

const PING: &str = "PING";
const SET_MATCHING_MODE: &str = "SET_MATCHING_MODE";

#[derive(Parser)]
#[command(name = "socket-router")]
#[command(about = "WebSocket request router", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_logging(&config.observability)?;
    tracing::info!("socket-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.listener.path,
        read_deadline_ms = config.session.read_deadline_ms,
        recovery = config.dispatch.recovery,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut router = Router::new();
    router.route_fn(PING, ping).route_fn(SET_MATCHING_MODE, set_matching_mode);
    tracing::info!(codes = ?router.codes(), "Routes registered");
    let chain = Chain::for_dispatch(&config.dispatch, router);

    let server = WsServer::new(config, chain);
    let listener = server.bind().await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn ping(session: Session, request: Request) -> HandlerResult {
    session
        .send_response(&Response::ok(request.code().clone(), "Pong"))
        .await;
    Ok(())
}

/// Acknowledges a matching mode change for the connected user.
async fn set_matching_mode(session: Session, request: Request) -> HandlerResult {
    session
        .send_response(&Response::ok(request.code().clone(), "Set matching mode success"))
        .await;
    Ok(())
}
