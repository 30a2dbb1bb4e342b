//! Session state machine.
//!
//! # States
//! ```text
//! Init → Upgrading → ConnectingUpstream → Relaying → Closing → Closed
//!                          │                            ▲
//!                          ├── Unroutable ──────────────┼──→ Closed
//!                          └── downstream close/loss ───┘
//! ```
//!
//! # Design Decisions
//! - Pure value type; the driver feeds it events and logs rejected ones
//! - `Closed` absorbs every event so repeated closes are harmless
//! - `Closing` ends once every leg that was ever attached reports closed

use thiserror::Error;

use crate::session::frame::Side;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Upgrading,
    ConnectingUpstream,
    Relaying,
    Closing,
    Closed,
}

/// Something that happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The inbound request was classified as an upgrade attempt.
    UpgradeRequested,
    /// The inbound handshake completed.
    DownstreamUpgraded,
    /// The upstream handshake succeeded and the relay is wired.
    UpstreamAttached,
    /// No upstream will ever be attached (bad route, unknown node, failed connect).
    Unroutable,
    /// A Close frame arrived on a leg.
    CloseReceived(Side),
    /// A leg failed or ended without a Close frame.
    LegLost(Side),
    /// The proxy is shutting down.
    ShutdownRequested,
    /// A leg finished closing.
    LegClosed(Side),
}

/// An event that makes no sense in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid session transition: {event:?} in state {state:?}")]
pub struct TransitionError {
    pub state: SessionState,
    pub event: SessionEvent,
}

/// Transition table plus the per-leg bookkeeping `Closing` needs.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    upstream_attached: bool,
    downstream_closed: bool,
    upstream_closed: bool,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Init,
            upstream_attached: false,
            downstream_closed: false,
            upstream_closed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Apply an event, returning the new state.
    ///
    /// On error the state is left unchanged.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, TransitionError> {
        use SessionEvent::*;
        use SessionState::*;

        let next = match (self.state, event) {
            (Closed, _) => Closed,

            (Init, UpgradeRequested) => Upgrading,
            (Upgrading, DownstreamUpgraded) => ConnectingUpstream,

            (ConnectingUpstream, UpstreamAttached) => {
                self.upstream_attached = true;
                Relaying
            }
            (ConnectingUpstream, Unroutable) => Closed,
            (ConnectingUpstream, CloseReceived(Side::Downstream))
            | (ConnectingUpstream, LegLost(Side::Downstream))
            | (ConnectingUpstream, ShutdownRequested) => Closing,

            (Relaying, CloseReceived(_)) | (Relaying, LegLost(_)) | (Relaying, ShutdownRequested) => {
                Closing
            }

            (Closing, LegClosed(side)) => {
                match side {
                    Side::Downstream => self.downstream_closed = true,
                    Side::Upstream => self.upstream_closed = true,
                }
                if self.downstream_closed && (self.upstream_closed || !self.upstream_attached) {
                    Closed
                } else {
                    Closing
                }
            }
            // A second close or loss while already closing changes nothing.
            (Closing, CloseReceived(_)) | (Closing, LegLost(_)) | (Closing, ShutdownRequested) => {
                Closing
            }

            (state, event) => return Err(TransitionError { state, event }),
        };

        self.state = next;
        Ok(next)
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
