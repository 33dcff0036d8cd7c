//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use socket_router::{Handler, Hub, Request, Response, Router, ServerConfig, Session, Shutdown, WsServer};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A server running on an ephemeral port. Shuts down when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Hub,
    shutdown: Shutdown,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

impl TestServer {
    pub async fn start(config: ServerConfig, handler: impl Handler + 'static) -> Self {
        let server = WsServer::new(config, handler);
        let hub = server.hub().clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        tokio::spawn(server.run(listener, signal));

        Self { addr, hub, shutdown }
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    /// Wait until exactly `n` sessions are registered.
    pub async fn wait_for_sessions(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while self.hub.len().await != n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {n} sessions, found {}",
                self.hub.len().await
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// WebSocket client that splits coalesced frames back into responses.
pub struct TestClient {
    pub socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<Value>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (socket, _) = connect_async(format!("ws://{addr}/conn")).await.unwrap();
        Self {
            socket,
            pending: VecDeque::new(),
        }
    }

    pub async fn send(&mut self, code: &str, body: Value) {
        let frame = json!({ "code": code, "body": body }).to_string();
        self.send_raw(&frame).await;
    }

    pub async fn send_raw(&mut self, frame: &str) {
        self.socket.send(Message::Text(frame.into())).await.unwrap();
    }

    /// Next response, skipping control frames.
    pub async fn recv(&mut self) -> Value {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return value;
            }
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.socket.next())
                .await
                .expect("timed out waiting for a response")
                .expect("connection closed")
                .unwrap();
            if let Message::Text(text) = frame {
                for line in text.as_str().lines() {
                    self.pending.push_back(serde_json::from_str(line).unwrap());
                }
            }
        }
    }

    /// True once the server has closed the connection.
    pub async fn closed_by_server(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.socket.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// The demo routes: PING and SET_MATCHING_MODE.
pub fn demo_router() -> Router {
    let mut router = Router::new();
    router
        .route_fn("PING", |session: Session, request: Request| async move {
            session
                .send_response(&Response::ok(request.code().clone(), "Pong"))
                .await;
            Ok(())
        })
        .route_fn("SET_MATCHING_MODE", |session: Session, request: Request| async move {
            session
                .send_response(&Response::ok(request.code().clone(), "Set matching mode success"))
                .await;
            Ok(())
        });
    router
}
