//! Error taxonomy for the proxy.
//!
//! Every failure a connection can hit is a [`ProxyError`] value. HTTP-facing
//! variants render as a status response; session-facing variants carry the
//! close code used when a leg has to be shut with an explanation.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::status_response;
use crate::session::Side;

/// Close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code sent to both legs when the proxy is shutting down.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code for a request the proxy refuses to route.
pub const CLOSE_POLICY: u16 = 1008;
/// Close code for a backend that could not be reached or was lost.
pub const CLOSE_INTERNAL: u16 = 1011;

/// Errors that can occur while accepting, routing or relaying a connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request could not be interpreted (missing or invalid `Host`, bad URI).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Only `GET` may be upgraded or served.
    #[error("method {0} is not allowed")]
    Forbidden(Method),

    /// A static path with nothing behind it.
    #[error("no static resource at {0}")]
    NotFoundStatic(String),

    /// The client asked for a WebSocket version the proxy cannot speak.
    #[error("unsupported websocket version")]
    UnsupportedUpgradeVersion,

    /// The upgrade path does not carry a usable route.
    #[error("route `{path}` is malformed: {reason}")]
    RouteMalformed { path: String, reason: &'static str },

    /// No node is registered under the key derived from the route.
    #[error("no upstream node registered under `{key}`")]
    UpstreamNotFound { key: String },

    /// The upgrade handshake failed on one of the legs.
    #[error("{side} handshake failed: {reason}")]
    HandshakeFailed { side: Side, reason: String },

    /// The upstream connect did not finish within the configured bound.
    #[error("upstream connect to {target} timed out after {secs}s")]
    ConnectTimeout { target: String, secs: u64 },

    /// A leg sent something that is not a valid WebSocket message.
    #[error("protocol violation on {side} leg: {reason}")]
    ProtocolViolation { side: Side, reason: String },

    /// I/O or codec failure on an established leg.
    #[error("{side} transport error: {reason}")]
    Transport { side: Side, reason: String },

    /// The leg went away without a close handshake.
    #[error("{0} peer closed")]
    PeerClosed(Side),
}

impl ProxyError {
    /// HTTP status used when the error surfaces before the upgrade.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Forbidden(_) => StatusCode::FORBIDDEN,
            ProxyError::NotFoundStatic(_) => StatusCode::NOT_FOUND,
            ProxyError::UnsupportedUpgradeVersion => StatusCode::BAD_REQUEST,
            ProxyError::RouteMalformed { .. } => StatusCode::NOT_FOUND,
            ProxyError::UpstreamNotFound { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::HandshakeFailed { .. }
            | ProxyError::ProtocolViolation { .. }
            | ProxyError::Transport { .. }
            | ProxyError::PeerClosed(_) => StatusCode::BAD_GATEWAY,
            ProxyError::ConnectTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// WebSocket close code used when the error ends a session.
    pub fn close_code(&self) -> u16 {
        match self {
            ProxyError::RouteMalformed { .. } | ProxyError::Forbidden(_) => CLOSE_POLICY,
            ProxyError::PeerClosed(_) => CLOSE_GOING_AWAY,
            _ => CLOSE_INTERNAL,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        status_response(self.status())
    }
}
