//! Outbound WebSocket handshake to a backend node.
//!
//! # Responsibilities
//! - Build the `ws://<ip>:<port><forward_path>` target
//! - Connect and handshake with the same size limits as the inbound side
//! - Bound the attempt when a connect timeout is configured
//!
//! # Design Decisions
//! - Single attempt: no retry, no backoff
//! - The target is used exactly as built, never normalized

use std::time::Duration;

use axum::http::Uri;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::config::{TimeoutConfig, UpgradeConfig};
use crate::error::ProxyError;
use crate::registry::NodeDescriptor;
use crate::session::{Leg, Side};

/// Opens upstream legs.
#[derive(Debug, Clone)]
pub struct UpstreamConnector {
    ws_config: WebSocketConfig,
    connect_timeout: Option<Duration>,
}

impl UpstreamConnector {
    pub fn new(upgrade: &UpgradeConfig, timeouts: &TimeoutConfig) -> Self {
        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(upgrade.max_message_size))
            .max_frame_size(Some(upgrade.max_frame_size));
        Self {
            ws_config,
            connect_timeout: timeouts.connect_secs.map(Duration::from_secs),
        }
    }

    /// Target URI for a node and the path forwarded to it.
    pub fn target(node: &NodeDescriptor, forward_path: &str) -> Result<Uri, ProxyError> {
        let target = format!("ws://{}{}", node.authority(), forward_path);
        target.parse::<Uri>().map_err(|e| ProxyError::HandshakeFailed {
            side: Side::Upstream,
            reason: format!("invalid target {}: {}", target, e),
        })
    }

    /// Connect to `target` and complete the client handshake.
    pub async fn connect(&self, target: Uri) -> Result<Leg, ProxyError> {
        let shown = target.to_string();
        let attempt =
            tokio_tungstenite::connect_async_with_config(target, Some(self.ws_config), false);

        let result = match self.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ProxyError::ConnectTimeout {
                        target: shown,
                        secs: limit.as_secs(),
                    })
                }
            },
            None => attempt.await,
        };

        let (socket, response) = result.map_err(|e| ProxyError::HandshakeFailed {
            side: Side::Upstream,
            reason: e.to_string(),
        })?;

        tracing::debug!(target = %shown, status = %response.status(), "Upstream handshake complete");
        Ok(Leg::upstream(socket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn node(ip: &str, port: u16) -> NodeDescriptor {
        NodeDescriptor {
            key: "wsnode-node1-chat".into(),
            host: "node1".into(),
            service: "chat".into(),
            ip: ip.into(),
            port,
        }
    }

    #[test]
    fn target_joins_authority_and_forward_path() {
        let uri = UpstreamConnector::target(&node("10.0.0.5", 9001), "/room1").unwrap();
        assert_eq!(uri.to_string(), "ws://10.0.0.5:9001/room1");

        let uri = UpstreamConnector::target(&node("::1", 9001), "/?token=a").unwrap();
        assert_eq!(uri.to_string(), "ws://[::1]:9001/?token=a");
    }

    #[tokio::test]
    async fn refused_connection_is_a_handshake_failure() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = UpstreamConnector::new(&UpgradeConfig::default(), &TimeoutConfig::default());
        let target = UpstreamConnector::target(&node("127.0.0.1", port), "/").unwrap();
        let err = connector.connect(target).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::HandshakeFailed { side: Side::Upstream, .. }
        ));
    }

    #[tokio::test]
    async fn plain_http_answer_is_a_handshake_failure() {
        // Reads the upgrade request and answers it with a 404.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let backend = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
        });

        let connector = UpstreamConnector::new(&UpgradeConfig::default(), &TimeoutConfig::default());
        let target = UpstreamConnector::target(&node("127.0.0.1", port), "/room1").unwrap();
        let err = connector.connect(target).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::HandshakeFailed { side: Side::Upstream, .. }
        ));
        backend.await.unwrap();
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        // Accepts TCP but never answers the handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let holder = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let timeouts = TimeoutConfig {
            connect_secs: Some(1),
            ..TimeoutConfig::default()
        };
        let connector = UpstreamConnector::new(&UpgradeConfig::default(), &timeouts);
        let target = UpstreamConnector::target(&node("127.0.0.1", port), "/").unwrap();
        let err = connector.connect(target).await.unwrap_err();
        assert!(matches!(err, ProxyError::ConnectTimeout { secs: 1, .. }));
        holder.abort();
    }
}
