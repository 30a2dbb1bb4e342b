//! Downstream WebSocket upgrade.
//!
//! # Responsibilities
//! - Log the upgrade location the client asked for
//! - Negotiate the inbound handshake with the configured size limits
//! - Hand the upgraded socket to a new [`Session`]
//!
//! # Design Decisions
//! - Requests the library cannot upgrade get the library's own rejection
//! - Routing happens after the 101, inside the session, so an unroutable
//!   path is a dead-end session rather than an HTTP error

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::session::{Session, SessionContext, Side};

/// `ws://<host><path and query>`, the location an upgrade was requested for.
pub fn upgrade_location(host: &str, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("ws://{}{}", host, path)
}

/// Accept an upgrade attempt for `uri`.
pub fn accept(
    ctx: Arc<SessionContext>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    uri: &Uri,
    host: &str,
) -> Response {
    tracing::info!(location = %upgrade_location(host, uri), "Upgrade requested");

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            if matches!(
                rejection,
                WebSocketUpgradeRejection::InvalidWebSocketVersionHeader(_)
            ) {
                tracing::warn!(error = %ProxyError::UnsupportedUpgradeVersion, "Upgrade rejected");
            } else {
                tracing::warn!(error = %rejection, "Upgrade rejected");
            }
            return rejection.into_response();
        }
    };

    let raw_path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let max_message_size = ctx.upgrade.max_message_size;
    let max_frame_size = ctx.upgrade.max_frame_size;

    upgrade
        .max_message_size(max_message_size)
        .max_frame_size(max_frame_size)
        .on_failed_upgrade(|e: axum::Error| {
            tracing::warn!(error = %failed_upgrade(e), "Downstream upgrade failed");
        })
        .on_upgrade(move |socket| Session::new(ctx, raw_path).run(socket))
}

fn failed_upgrade(error: axum::Error) -> ProxyError {
    ProxyError::HandshakeFailed {
        side: Side::Downstream,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_keeps_path_and_query() {
        let uri: Uri = "/wsin/node1/chat/room1?x=1".parse().unwrap();
        assert_eq!(
            upgrade_location("proxy:8080", &uri),
            "ws://proxy:8080/wsin/node1/chat/room1?x=1"
        );
    }

    #[test]
    fn failed_upgrade_is_a_downstream_handshake_failure() {
        let error = failed_upgrade(axum::Error::new(std::io::Error::other("connection reset")));
        match error {
            ProxyError::HandshakeFailed { side, reason } => {
                assert_eq!(side, Side::Downstream);
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
