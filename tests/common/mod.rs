//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use wsin_proxy::config::{NodeConfig, ProxyConfig};
use wsin_proxy::session::SessionTracker;
use wsin_proxy::HttpServer;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the test wants the backend to do next.
pub enum Script {
    Send(Message),
    /// Drop the TCP connection without a close handshake.
    Drop,
}

/// A WebSocket backend that serves a single connection.
pub struct StubBackend {
    pub addr: SocketAddr,
    /// Path and query of the upgrade request it received.
    pub paths: mpsc::UnboundedReceiver<String>,
    /// Every message read from the proxy, pings and closes included.
    pub frames: mpsc::UnboundedReceiver<Message>,
    pub script: mpsc::UnboundedSender<Script>,
}

impl StubBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, paths) = mpsc::unbounded_channel();
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (script, mut script_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let record_path = |request: &Request, response: Response| {
                let path = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_default();
                let _ = path_tx.send(path);
                Ok::<Response, ErrorResponse>(response)
            };
            let socket = tokio_tungstenite::accept_hdr_async(stream, record_path)
                .await
                .unwrap();
            let (mut sink, mut stream) = socket.split();

            loop {
                tokio::select! {
                    message = stream.next() => match message {
                        Some(Ok(message)) => {
                            let _ = frame_tx.send(message);
                        }
                        _ => break,
                    },
                    command = script_rx.recv() => match command {
                        Some(Script::Send(message)) => {
                            if sink.send(message).await.is_err() {
                                break;
                            }
                        }
                        Some(Script::Drop) | None => return,
                    },
                }
            }
        });

        Self {
            addr,
            paths,
            frames,
            script,
        }
    }

    pub fn send(&self, message: Message) {
        self.script.send(Script::Send(message)).unwrap();
    }

    /// Next message from the proxy, skipping pongs.
    pub async fn next_frame(&mut self) -> Message {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), self.frames.recv())
                .await
                .expect("backend timed out waiting for a frame")
                .expect("backend connection ended");
            if !matches!(message, Message::Pong(_)) {
                return message;
            }
        }
    }

    /// True if no upgrade reaches the backend within `wait`.
    pub async fn stays_unused(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.paths.recv()).await.is_err()
    }

    pub async fn next_path(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.paths.recv())
            .await
            .expect("backend was never connected")
            .unwrap()
    }
}

/// A proxy serving on an ephemeral local port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub sessions: SessionTracker,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(config);
        let sessions = server.sessions();
        let (updates, update_rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let signal = async {
                let _ = stop_rx.await;
            };
            server.run(listener, update_rx, signal).await.unwrap();
        });

        Self {
            addr,
            sessions,
            updates,
            stop,
            handle,
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, path: &str) -> Client {
        let url = format!("ws://{}{}", self.addr, path);
        let (client, response) = tokio_tungstenite::connect_async(url).await.unwrap();
        assert_eq!(response.status(), 101);
        client
    }

    /// Trigger shutdown and wait for the server to finish draining.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("proxy did not stop")
            .unwrap();
    }

    pub async fn wait_idle(&self) -> bool {
        self.sessions.wait_idle(Duration::from_secs(5)).await
    }
}

pub fn node(hostname: &str, service: &str, addr: SocketAddr) -> NodeConfig {
    NodeConfig {
        hostname: hostname.to_string(),
        service: service.to_string(),
        ip: addr.ip().to_string(),
        port: addr.port(),
    }
}

pub fn config_with(nodes: Vec<NodeConfig>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.close_grace_ms = 500;
    config.timeouts.drain_secs = 5;
    config.nodes = nodes;
    config
}

/// Next message on a client connection, skipping pings and pongs.
pub async fn next_message(client: &mut Client) -> Option<Message> {
    loop {
        let item = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("client timed out waiting for a frame");
        match item {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(message)) => return Some(message),
            Some(Err(_)) | None => return None,
        }
    }
}

/// Close code of the next message, which must be a Close.
pub async fn expect_close(client: &mut Client) -> (u16, String) {
    match next_message(client).await {
        Some(Message::Close(Some(frame))) => (u16::from(frame.code), frame.reason.as_str().to_string()),
        other => panic!("expected close frame, got {:?}", other),
    }
}

/// True if nothing arrives within `wait`.
pub async fn stays_quiet(client: &mut Client, wait: Duration) -> bool {
    tokio::time::timeout(wait, client.next()).await.is_err()
}
