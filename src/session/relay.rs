//! Bidirectional frame relay between the two legs of a session.
//!
//! # Data Flow
//! ```text
//! downstream.frames ──┐                ┌──→ upstream send queue
//!                     ├── select! ─────┤
//! upstream.frames ────┘                └──→ downstream send queue
//! ```
//!
//! # Design Decisions
//! - One loop per session; each direction keeps receipt order
//! - Pings and pongs are forwarded verbatim, never synthesized
//! - A Close stops the loop after it is forwarded, so nothing follows it
//! - A frame is read from one leg only once the other leg has queue room for
//!   the previous one, so a slow reader throttles its peer

use crate::error::ProxyError;
use crate::lifecycle::ShutdownSignal;
use crate::session::frame::Side;
use crate::session::leg::Leg;

/// Why the relay stopped.
#[derive(Debug)]
pub enum RelayOutcome {
    /// A Close frame arrived on `by` and was forwarded to the other leg.
    /// Both legs have been asked to close.
    Closed { by: Side },
    /// `side` ended or failed without a close handshake.
    Lost {
        side: Side,
        error: Option<ProxyError>,
    },
    /// The proxy is shutting down.
    Shutdown,
}

/// Relay frames in both directions until a close, a loss or shutdown.
pub async fn relay(
    downstream: &mut Leg,
    upstream: &mut Leg,
    shutdown: &mut ShutdownSignal,
) -> RelayOutcome {
    loop {
        let (side, item) = tokio::select! {
            item = downstream.next_frame() => (Side::Downstream, item),
            item = upstream.next_frame() => (Side::Upstream, item),
            _ = shutdown.recv() => return RelayOutcome::Shutdown,
        };

        let (source, peer) = match side {
            Side::Downstream => (downstream.handle(), upstream.handle()),
            Side::Upstream => (upstream.handle(), downstream.handle()),
        };

        let frame = match item {
            Some(Ok(frame)) => frame,
            Some(Err(error)) => return RelayOutcome::Lost { side, error: Some(error) },
            None => return RelayOutcome::Lost { side, error: None },
        };

        if frame.is_close() {
            tracing::debug!(from = %side, "Close received, closing both legs");
            peer.close_with(Some(frame));
            source.close();
            return RelayOutcome::Closed { by: side };
        }

        tracing::trace!(from = %side, kind = frame.kind(), len = frame.len(), "Relaying frame");
        let delivered = tokio::select! {
            delivered = peer.send(frame) => delivered,
            _ = shutdown.recv() => return RelayOutcome::Shutdown,
        };
        if !delivered {
            return RelayOutcome::Lost {
                side: side.peer(),
                error: None,
            };
        }
    }
}
