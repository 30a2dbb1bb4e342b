//! Per-connection session task.
//!
//! # Data Flow
//! ```text
//! upgraded socket
//!     → resolve route → registry lookup → spawn upstream connect
//!     → (downstream read while connecting; early frames held, bounded)
//!     → relay until close / loss / shutdown
//!     → close both legs → release
//! ```
//!
//! Everything a session owns lives in this task. The upstream leg is a local
//! that is written once when the connect result arrives over a oneshot.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::WebSocket;
use axum::http::Uri;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::config::{DeadEndPolicy, ProxyConfig, TimeoutConfig, UpgradeConfig};
use crate::error::{ProxyError, CLOSE_GOING_AWAY, CLOSE_INTERNAL};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::registry::NodeRegistry;
use crate::routing::{RouteRequest, RouteResolver};
use crate::session::frame::{CloseReason, Frame, Side};
use crate::session::leg::Leg;
use crate::session::relay::{relay, RelayOutcome};
use crate::session::state::{SessionEvent, SessionMachine};
use crate::session::tracker::{SessionGuard, SessionId, SessionTracker};
use crate::upstream::UpstreamConnector;

/// Shared, read-only collaborators of every session.
#[derive(Debug)]
pub struct SessionContext {
    pub registry: Arc<dyn NodeRegistry>,
    pub resolver: RouteResolver,
    pub connector: UpstreamConnector,
    pub upgrade: UpgradeConfig,
    pub timeouts: TimeoutConfig,
    pub shutdown: Arc<Shutdown>,
    pub tracker: SessionTracker,
}

impl SessionContext {
    pub fn new(config: &ProxyConfig, registry: Arc<dyn NodeRegistry>, shutdown: Arc<Shutdown>) -> Self {
        Self {
            registry,
            resolver: RouteResolver::new(config.upgrade.route_prefix.clone()),
            connector: UpstreamConnector::new(&config.upgrade, &config.timeouts),
            upgrade: config.upgrade.clone(),
            timeouts: config.timeouts.clone(),
            shutdown,
            tracker: SessionTracker::new(),
        }
    }

    fn close_grace(&self) -> Duration {
        Duration::from_millis(self.timeouts.close_grace_ms)
    }
}

/// Frames a client may send before its upstream attaches; later ones are dropped.
pub const PENDING_LIMIT: usize = 16;

/// How the connect phase ended.
enum Attach {
    /// Carries the downstream frames received while connecting.
    Connected(Leg, VecDeque<Frame>),
    Failed(ProxyError),
    DownstreamClosed,
    DownstreamLost(Option<ProxyError>),
    Shutdown,
}

/// One proxied connection, from downstream upgrade to release.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: Instant,
    raw_path: String,
    machine: SessionMachine,
    ctx: Arc<SessionContext>,
    shutdown: ShutdownSignal,
    _guard: SessionGuard,
}

impl Session {
    /// Create a session for an upgrade of `raw_path` (path plus query).
    pub fn new(ctx: Arc<SessionContext>, raw_path: impl Into<String>) -> Self {
        let id = SessionId::new();
        Self {
            id,
            created_at: Instant::now(),
            raw_path: raw_path.into(),
            machine: SessionMachine::new(),
            shutdown: ctx.shutdown.subscribe(),
            _guard: ctx.tracker.track(id),
            ctx,
        }
    }

    /// Drive the session over an upgraded downstream socket until it is released.
    pub async fn run(self, socket: WebSocket) {
        let span = tracing::info_span!("session", id = %self.id, path = %self.raw_path);
        self.drive(socket).instrument(span).await
    }

    async fn drive(mut self, socket: WebSocket) {
        self.advance(SessionEvent::UpgradeRequested);
        self.advance(SessionEvent::DownstreamUpgraded);
        let mut downstream = Leg::downstream(socket);
        tracing::debug!("Downstream upgraded");

        match self.route() {
            Ok(target) => match self.attach(&mut downstream, target).await {
                Attach::Connected(upstream, pending) => {
                    self.advance(SessionEvent::UpstreamAttached);
                    tracing::info!(pending = pending.len(), "Upstream attached, relaying");
                    self.relay_frames(downstream, upstream, pending).await;
                }
                Attach::Failed(error) => {
                    tracing::warn!(error = %error, "Upstream connect failed");
                    self.dead_end(downstream, error).await;
                }
                Attach::DownstreamClosed => {
                    tracing::debug!("Downstream closed before upstream attached");
                    self.advance(SessionEvent::CloseReceived(Side::Downstream));
                    self.shut(downstream).await;
                }
                Attach::DownstreamLost(error) => {
                    log_loss(Side::Downstream, error.as_ref());
                    self.advance(SessionEvent::LegLost(Side::Downstream));
                    self.shut(downstream).await;
                }
                Attach::Shutdown => {
                    self.advance(SessionEvent::ShutdownRequested);
                    downstream.handle().close_with(Some(going_away()));
                    self.shut(downstream).await;
                }
            },
            Err(error) => {
                tracing::warn!(error = %error, "Upgrade could not be routed");
                self.dead_end(downstream, error).await;
            }
        }

        tracing::info!(
            state = ?self.machine.state(),
            elapsed_ms = self.created_at.elapsed().as_millis() as u64,
            "Session released"
        );
    }

    /// Resolve the upgrade path to an upstream target.
    fn route(&self) -> Result<Uri, ProxyError> {
        let route = self
            .ctx
            .resolver
            .resolve(&RouteRequest::new(self.raw_path.as_str()))?;
        let key = format!("{}{}", self.ctx.upgrade.node_key_prefix, route.registry_key);
        let node = self
            .ctx
            .registry
            .lookup(&key)
            .ok_or(ProxyError::UpstreamNotFound { key })?;

        let target = UpstreamConnector::target(&node, &route.forward_path)?;
        tracing::info!(key = %node.key, target = %target, "Routing upgrade");
        Ok(target)
    }

    /// Connect upstream while continuing to read the downstream leg.
    async fn attach(&mut self, downstream: &mut Leg, target: Uri) -> Attach {
        let connector = self.ctx.connector.clone();
        let (tx, mut rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = tx.send(connector.connect(target).await);
        });

        let shutdown = &mut self.shutdown;
        let mut pending = VecDeque::new();
        let attach = loop {
            tokio::select! {
                result = &mut rx => {
                    break match result {
                        Ok(Ok(upstream)) => Attach::Connected(upstream, std::mem::take(&mut pending)),
                        Ok(Err(error)) => Attach::Failed(error),
                        Err(_) => Attach::Failed(ProxyError::HandshakeFailed {
                            side: Side::Upstream,
                            reason: "connect task ended without a result".to_string(),
                        }),
                    };
                }
                item = downstream.next_frame() => match item {
                    Some(Ok(frame)) if frame.is_close() => break Attach::DownstreamClosed,
                    Some(Ok(frame)) if pending.len() < PENDING_LIMIT => pending.push_back(frame),
                    Some(Ok(frame)) => {
                        tracing::debug!(
                            kind = frame.kind(),
                            len = frame.len(),
                            "Dropping frame, too many received before upstream attached"
                        );
                    }
                    Some(Err(error)) => break Attach::DownstreamLost(Some(error)),
                    None => break Attach::DownstreamLost(None),
                },
                _ = shutdown.recv() => break Attach::Shutdown,
            }
        };

        if !matches!(attach, Attach::Connected(..) | Attach::Failed(_)) {
            task.abort();
        }
        attach
    }

    async fn relay_frames(&mut self, mut downstream: Leg, mut upstream: Leg, pending: VecDeque<Frame>) {
        for frame in pending {
            if !upstream.handle().send(frame).await {
                break;
            }
        }
        let outcome = relay(&mut downstream, &mut upstream, &mut self.shutdown).await;
        match outcome {
            RelayOutcome::Closed { by } => {
                tracing::info!(by = %by, "Close relayed");
                self.advance(SessionEvent::CloseReceived(by));
                self.shut_both(downstream, upstream).await;
            }
            RelayOutcome::Lost {
                side: Side::Downstream,
                error,
            } => {
                log_loss(Side::Downstream, error.as_ref());
                self.advance(SessionEvent::LegLost(Side::Downstream));
                self.shut_both(downstream, upstream).await;
            }
            RelayOutcome::Lost {
                side: Side::Upstream,
                error,
            } => {
                log_loss(Side::Upstream, error.as_ref());
                self.advance(SessionEvent::LegLost(Side::Upstream));
                upstream.shut(self.ctx.close_grace()).await;
                self.advance(SessionEvent::LegClosed(Side::Upstream));

                match self.ctx.upgrade.dead_end {
                    DeadEndPolicy::Strict => {
                        downstream.handle().close_with(Some(Frame::Close(Some(CloseReason::new(
                            CLOSE_INTERNAL,
                            "upstream lost",
                        )))));
                    }
                    DeadEndPolicy::Lenient => self.park(&mut downstream).await,
                }
                self.shut(downstream).await;
            }
            RelayOutcome::Shutdown => {
                tracing::info!("Shutdown requested, closing both legs");
                self.advance(SessionEvent::ShutdownRequested);
                downstream.handle().close_with(Some(going_away()));
                upstream.handle().close_with(Some(going_away()));
                self.shut_both(downstream, upstream).await;
            }
        }
    }

    /// No upstream will ever be attached; apply the dead-end policy.
    async fn dead_end(&mut self, mut downstream: Leg, error: ProxyError) {
        self.advance(SessionEvent::Unroutable);
        match self.ctx.upgrade.dead_end {
            DeadEndPolicy::Strict => {
                tracing::debug!(code = error.close_code(), "Closing unroutable downstream");
                downstream.handle().close_with(Some(Frame::Close(Some(CloseReason::new(
                    error.close_code(),
                    error.to_string(),
                )))));
            }
            DeadEndPolicy::Lenient => self.park(&mut downstream).await,
        }
        downstream.shut(self.ctx.close_grace()).await;
    }

    /// Keep an unrelayed downstream open, dropping its frames until it leaves.
    async fn park(&mut self, downstream: &mut Leg) {
        tracing::debug!("Parking downstream without an upstream");
        loop {
            tokio::select! {
                item = downstream.next_frame() => match item {
                    Some(Ok(frame)) if frame.is_close() => {
                        tracing::debug!("Parked downstream closed");
                        return;
                    }
                    Some(Ok(frame)) => {
                        tracing::debug!(kind = frame.kind(), len = frame.len(), "Dropping frame, no upstream");
                    }
                    Some(Err(_)) | None => return,
                },
                _ = self.shutdown.recv() => {
                    downstream.handle().close_with(Some(going_away()));
                    return;
                }
            }
        }
    }

    async fn shut(&mut self, leg: Leg) {
        let side = leg.side();
        leg.shut(self.ctx.close_grace()).await;
        self.advance(SessionEvent::LegClosed(side));
    }

    async fn shut_both(&mut self, downstream: Leg, upstream: Leg) {
        let grace = self.ctx.close_grace();
        tokio::join!(downstream.shut(grace), upstream.shut(grace));
        self.advance(SessionEvent::LegClosed(Side::Upstream));
        self.advance(SessionEvent::LegClosed(Side::Downstream));
    }

    fn advance(&mut self, event: SessionEvent) {
        match self.machine.apply(event) {
            Ok(state) => tracing::trace!(?event, ?state, "Session transition"),
            Err(e) => tracing::warn!(error = %e, "Ignoring session event"),
        }
    }
}

fn going_away() -> Frame {
    Frame::Close(Some(CloseReason::new(CLOSE_GOING_AWAY, "proxy shutting down")))
}

fn log_loss(side: Side, error: Option<&ProxyError>) {
    match error {
        Some(error) => tracing::warn!(%side, error = %error, "Leg lost"),
        None => tracing::info!(%side, "Leg ended without close"),
    }
}
